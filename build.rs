fn main() {
    // ESP-IDF sysenv propagation only matters for flashing builds; host
    // builds (tests, fuzzing) skip it.
    if std::env::var_os("CARGO_FEATURE_ESPIDF").is_some() {
        embuild::espidf::sysenv::output();
    }
}
