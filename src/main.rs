fn main() -> std::process::ExitCode {
    scopeguard_lib::run()
}
