fn main() {
    println!("cargo:rerun-if-env-changed=SHUNTMETER_CONFIG_JSON");
    println!("cargo:rerun-if-env-changed=SHUNTMETER_MONITOR_ITERATIONS");

    // Host builds (library + tests) have no ESP-IDF toolchain to describe.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
