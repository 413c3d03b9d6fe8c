use std::process::ExitCode;

fn main() -> ExitCode {
    modpublisher_lib::run()
}
