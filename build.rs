fn main() {
    // Host builds (tests, fuzzing) need no ESP-IDF environment.
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("espidf") {
        embuild::espidf::sysenv::output();
    }
}
