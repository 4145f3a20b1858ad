use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use archivist::cli::{
    ArchiveCommands, DistroCommands, GrantCommands, PersonCommands, ProcessorCommands,
    SeriesCommands, TeamCommands,
};

#[derive(Parser)]
#[command(name = "archivist")]
#[command(about = "Package archive administration", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the archive database and configuration
    Init {
        /// Data directory for the archive database
        #[arg(long, default_value = "./data")]
        data_dir: String,
    },

    /// Manage distributions
    Distro {
        #[command(subcommand)]
        command: DistroCommands,
    },

    /// Manage distribution series
    Series {
        #[command(subcommand)]
        command: SeriesCommands,
    },

    /// Manage people and teams
    Person {
        #[command(subcommand)]
        command: PersonCommands,
    },

    /// Manage team membership
    Team {
        #[command(subcommand)]
        command: TeamCommands,
    },

    /// Manage build processors
    Processor {
        #[command(subcommand)]
        command: ProcessorCommands,
    },

    /// Manage archives
    Archive {
        #[command(subcommand)]
        command: ArchiveCommands,
    },

    /// Grant upload or queue-admin rights on an archive
    Grant {
        #[command(subcommand)]
        command: GrantCommands,
    },

    /// Check whether a person may upload to an archive
    CheckUpload {
        /// Data directory for the archive database
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Archive reference
        reference: String,

        /// Uploader name
        #[arg(long)]
        person: String,

        /// Target series
        #[arg(long)]
        series: String,

        /// Target pocket
        #[arg(long, default_value = "RELEASE")]
        pocket: String,

        /// Source package name
        #[arg(long)]
        source: Option<String>,

        /// Target component
        #[arg(long)]
        component: Option<String>,

        /// Require a grant on the exact component
        #[arg(long)]
        strict: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show build counters for an archive
    Counters {
        /// Data directory for the archive database
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Archive reference
        reference: String,

        /// Count NEEDSBUILD builds as pending
        #[arg(long)]
        include_needsbuild: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("archivist=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { data_dir } => archivist::cli::run_init(data_dir)?,
        Commands::Distro { command } => match command {
            DistroCommands::Add {
                data_dir,
                name,
                display_name,
                redirect_release_uploads,
            } => archivist::cli::run_distro_add(data_dir, name, display_name, redirect_release_uploads)?,
        },
        Commands::Series { command } => match command {
            SeriesCommands::Add {
                data_dir,
                distro,
                name,
                status,
                architectures,
                parents,
                inherit_overrides,
            } => archivist::cli::run_series_add(
                data_dir,
                distro,
                name,
                status,
                architectures,
                parents,
                inherit_overrides,
            )?,
        },
        Commands::Person { command } => match command {
            PersonCommands::Add {
                data_dir,
                name,
                display_name,
                team,
                private,
            } => archivist::cli::run_person_add(data_dir, name, display_name, team, private)?,
        },
        Commands::Team { command } => match command {
            TeamCommands::AddMember {
                data_dir,
                team,
                member,
            } => archivist::cli::run_team_add_member(data_dir, team, member)?,
        },
        Commands::Processor { command } => match command {
            ProcessorCommands::Add {
                data_dir,
                name,
                restricted,
                no_build_by_default,
                nonvirtualized,
            } => archivist::cli::run_processor_add(
                data_dir,
                name,
                restricted,
                no_build_by_default,
                nonvirtualized,
            )?,
        },
        Commands::Archive { command } => match command {
            ArchiveCommands::Create {
                data_dir,
                distro,
                owner,
                purpose,
                name,
                private,
                json,
            } => archivist::cli::run_archive_create(
                data_dir, distro, owner, purpose, name, private, json,
            )?,
            ArchiveCommands::Show {
                data_dir,
                reference,
                json,
            } => archivist::cli::run_archive_show(data_dir, reference, json)?,
            ArchiveCommands::Enable {
                data_dir,
                reference,
            } => archivist::cli::run_archive_enable(data_dir, reference)?,
            ArchiveCommands::Disable {
                data_dir,
                reference,
            } => archivist::cli::run_archive_disable(data_dir, reference)?,
            ArchiveCommands::Delete {
                data_dir,
                reference,
                by,
            } => archivist::cli::run_archive_delete(data_dir, reference, by)?,
        },
        Commands::Grant { command } => match command {
            GrantCommands::Component {
                data_dir,
                reference,
                person,
                component,
            } => archivist::cli::run_grant_component(data_dir, reference, person, component)?,
            GrantCommands::Package {
                data_dir,
                reference,
                person,
                package,
            } => archivist::cli::run_grant_package(data_dir, reference, person, package)?,
            GrantCommands::Pocket {
                data_dir,
                reference,
                person,
                pocket,
            } => archivist::cli::run_grant_pocket(data_dir, reference, person, pocket)?,
            GrantCommands::QueueAdmin {
                data_dir,
                reference,
                person,
                component,
                pocket,
                series,
            } => archivist::cli::run_grant_queue_admin(
                data_dir, reference, person, component, pocket, series,
            )?,
        },
        Commands::CheckUpload {
            data_dir,
            reference,
            person,
            series,
            pocket,
            source,
            component,
            strict,
            json,
        } => archivist::cli::run_check_upload(
            data_dir, reference, person, series, pocket, source, component, strict, json,
        )?,
        Commands::Counters {
            data_dir,
            reference,
            include_needsbuild,
            json,
        } => archivist::cli::run_counters(data_dir, reference, include_needsbuild, json)?,
    }

    Ok(())
}
