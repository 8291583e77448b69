use std::process::ExitCode;

fn main() -> ExitCode {
    if audit_exporter::version_requested(std::env::args_os()) {
        println!("{}", audit_exporter::VERSION_LINE);
        return ExitCode::SUCCESS;
    }
    match audit_exporter::run_exporter() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("audit-exporter: {error}");
            ExitCode::FAILURE
        }
    }
}
