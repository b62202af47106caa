fn main() {
    // Only emit ESP-IDF link/sysroot metadata when building for the target.
    // Host builds (library + tests) skip it entirely.
    if std::env::var("CARGO_FEATURE_ESPIDF").is_ok() {
        embuild::espidf::sysenv::output();
    }
}
