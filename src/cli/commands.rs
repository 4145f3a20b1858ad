use clap::Subcommand;

#[derive(Subcommand)]
pub enum DistroCommands {
    /// Register a distribution
    Add {
        /// Data directory for the archive database
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Short name, e.g. "ubuntu"
        #[arg(long)]
        name: String,

        /// Human-readable name (defaults to the short name)
        #[arg(long)]
        display_name: Option<String>,

        /// Send release-pocket uploads of the primary archive to proposed
        #[arg(long)]
        redirect_release_uploads: bool,
    },
}

#[derive(Subcommand)]
pub enum SeriesCommands {
    /// Add a series to a distribution
    Add {
        /// Data directory for the archive database
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Distribution name
        #[arg(long)]
        distro: String,

        /// Series name, e.g. "noble"
        #[arg(long)]
        name: String,

        /// Series status (EXPERIMENTAL, DEVELOPMENT, FROZEN, CURRENT, SUPPORTED, OBSOLETE, FUTURE)
        #[arg(long, default_value = "DEVELOPMENT")]
        status: String,

        /// Architecture tags to enable; each must name a registered processor
        #[arg(long = "arch")]
        architectures: Vec<String>,

        /// Parent series as DISTRO/SERIES (repeatable, in priority order)
        #[arg(long = "parent")]
        parents: Vec<String>,

        /// Inherit overrides from the parent series
        #[arg(long)]
        inherit_overrides: bool,
    },
}

#[derive(Subcommand)]
pub enum PersonCommands {
    /// Add a person or team
    Add {
        /// Data directory for the archive database
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Unique name
        #[arg(long)]
        name: String,

        /// Human-readable name (defaults to the name)
        #[arg(long)]
        display_name: Option<String>,

        /// Create a team instead of a person
        #[arg(long)]
        team: bool,

        /// Private teams can only own private archives
        #[arg(long)]
        private: bool,
    },
}

#[derive(Subcommand)]
pub enum TeamCommands {
    /// Add a person or team to a team
    AddMember {
        /// Data directory for the archive database
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Team name
        #[arg(long)]
        team: String,

        /// Member name
        #[arg(long)]
        member: String,
    },
}

#[derive(Subcommand)]
pub enum ProcessorCommands {
    /// Register a build processor
    Add {
        /// Data directory for the archive database
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Processor name, e.g. "amd64"
        #[arg(long)]
        name: String,

        /// Only administrators may enable it on an archive
        #[arg(long)]
        restricted: bool,

        /// Do not enable it on new archives
        #[arg(long)]
        no_build_by_default: bool,

        /// Builders for this processor also run non-virtualized
        #[arg(long)]
        nonvirtualized: bool,
    },
}

#[derive(Subcommand)]
pub enum ArchiveCommands {
    /// Create an archive
    Create {
        /// Data directory for the archive database
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Distribution name
        #[arg(long)]
        distro: String,

        /// Owning person or team
        #[arg(long)]
        owner: String,

        /// Archive purpose (PRIMARY, PARTNER, PPA, COPY)
        #[arg(long, default_value = "PPA")]
        purpose: String,

        /// Archive name (defaults by purpose)
        #[arg(long)]
        name: Option<String>,

        /// Create a private archive
        #[arg(long)]
        private: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show an archive
    Show {
        /// Data directory for the archive database
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Archive reference, e.g. "ubuntu" or "~alice/ubuntu/ppa"
        reference: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Enable an archive and release its suspended builds
    Enable {
        /// Data directory for the archive database
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Archive reference
        reference: String,
    },

    /// Disable an archive and suspend its pending builds
    Disable {
        /// Data directory for the archive database
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Archive reference
        reference: String,
    },

    /// Mark an archive for deletion
    Delete {
        /// Data directory for the archive database
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Archive reference
        reference: String,

        /// Person requesting the deletion
        #[arg(long)]
        by: String,
    },
}

#[derive(Subcommand)]
pub enum GrantCommands {
    /// Allow uploads to a component
    Component {
        /// Data directory for the archive database
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Archive reference
        reference: String,

        /// Person or team receiving the grant
        #[arg(long)]
        person: String,

        /// Component name
        #[arg(long)]
        component: String,
    },

    /// Allow uploads of one source package
    Package {
        /// Data directory for the archive database
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Archive reference
        reference: String,

        /// Person or team receiving the grant
        #[arg(long)]
        person: String,

        /// Source package name
        #[arg(long)]
        package: String,
    },

    /// Allow uploads to a pocket
    Pocket {
        /// Data directory for the archive database
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Archive reference
        reference: String,

        /// Person or team receiving the grant
        #[arg(long)]
        person: String,

        /// Pocket name
        #[arg(long)]
        pocket: String,
    },

    /// Allow administering the upload queue of a component or pocket
    QueueAdmin {
        /// Data directory for the archive database
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Archive reference
        reference: String,

        /// Person or team receiving the grant
        #[arg(long)]
        person: String,

        /// Component name
        #[arg(long, conflicts_with = "pocket")]
        component: Option<String>,

        /// Pocket name
        #[arg(long, required_unless_present = "component")]
        pocket: Option<String>,

        /// Limit a pocket grant to one series
        #[arg(long, requires = "pocket")]
        series: Option<String>,
    },
}
