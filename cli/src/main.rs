use std::process::ExitCode;

use clap::Parser;
use exercheck_core::{diag, paths, report::Presenter, style::ColorScheme, Error};

mod cmd;
mod util;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let args = cmd::Args::parse();
    let (colors, bad_scheme) = ColorScheme::from_env();
    let presenter = Presenter::new(&colors);
    if let Some(name) = bad_scheme {
        presenter.warning(&format!(
            "Unknown color scheme '{}' (check the {} env var); using 'clear'",
            name,
            exercheck_core::style::COLOR_SCHEME_ENV
        ));
    }
    let start_dir = util::current_dir();

    match cmd::exec(&args, &presenter).await {
        Ok(code) => code,
        Err(Error::User { msg, tip }) => {
            presenter.error(&msg, tip.as_deref());
            ExitCode::FAILURE
        }
        Err(Error::Internal(e)) => {
            if paths::is_protected() {
                diag::dump_internal_error(&start_dir, &e);
                presenter.error(diag::INTERNAL_ERROR_MSG, None);
            } else {
                presenter.error(&format!("Internal error: {:?}", e), None);
            }
            ExitCode::FAILURE
        }
    }
}
