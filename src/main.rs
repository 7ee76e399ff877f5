use std::process::exit;

fn main() {
    if prospectlab::app::run_cli().is_err() {
        exit(1);
    }
}
