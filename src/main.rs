use clap::Parser;
use miette::Result;
use ntk::cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: bool) {
    let default = if verbose { "ntk=debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("NTK_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> Result<()> {
    // Reset SIGPIPE so piping into `head` or `grep -q` exits quietly
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    let global = cli.global;
    init_logging(global.verbose);

    match cli.command {
        Commands::Init(args) => ntk::cli::commands::init::run(args, &global),
        Commands::Template(cmd) => ntk::cli::commands::template::run(cmd, &global),
        Commands::Version(cmd) => ntk::cli::commands::version::run(cmd, &global),
        Commands::Category(cmd) => ntk::cli::commands::category::run(cmd, &global),
        Commands::Catalog(cmd) => ntk::cli::commands::catalog::run(cmd, &global),
        Commands::Schema(cmd) => ntk::cli::commands::schema::run(cmd, &global),
        Commands::Props(cmd) => ntk::cli::commands::props::run(cmd, &global),
        Commands::Completions(args) => ntk::cli::commands::completions::run(args),
    }
}
