use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use dog_assets::ResourceKind;

#[derive(Parser, Debug)]
#[command(
    name = "dog-assets",
    about = "Collect static files and clean up remote assets",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// TOML configuration file; credentials may also come from CLOUDINARY_* variables
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Upload hashed static files and write the manifest
    Collectstatic(CollectArgs),
    /// Remove media objects no record refers to
    Deleteorphanedmedia(OrphanedArgs),
    /// Remove static objects the manifest no longer maps to
    Deleteredundantstatic(RedundantArgs),
    /// Print the delivery URL of a stored name
    Url(ObjectArgs),
    /// Check whether a stored name exists remotely
    Exists(ObjectArgs),
    /// Print the remote size of a stored name
    Size(ObjectArgs),
    /// List directories and files under a media path
    Ls(ListArgs),
}

#[derive(Args, Debug)]
pub struct CollectArgs {
    /// Apart from hashed files, upload unhashed ones as well
    #[arg(long)]
    pub upload_unhashed_files: bool,

    /// Show what would be collected without uploading anything
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
pub struct OrphanedArgs {
    /// JSON file listing tracked kinds and referenced names
    #[arg(long)]
    pub references: PathBuf,

    /// Do not prompt before deleting
    #[arg(long)]
    pub noinput: bool,
}

#[derive(Args, Debug)]
pub struct RedundantArgs {
    /// Delete unhashed copies as well
    #[arg(long)]
    pub delete_unhashed_files: bool,

    /// Do not prompt before deleting
    #[arg(long)]
    pub noinput: bool,
}

#[derive(Args, Debug)]
pub struct ObjectArgs {
    pub name: String,

    /// Media resource kind
    #[arg(long, default_value = "image")]
    pub kind: ResourceKind,

    /// Resolve the name through the static storage instead
    #[arg(long = "static")]
    pub static_file: bool,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[arg(default_value = "")]
    pub path: String,

    #[arg(long, default_value = "image")]
    pub kind: ResourceKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reconcile_flags() {
        let cli = Cli::try_parse_from([
            "dog-assets",
            "--config",
            "assets.toml",
            "deleteredundantstatic",
            "--noinput",
            "--delete-unhashed-files",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("assets.toml")));
        match cli.command {
            Command::Deleteredundantstatic(args) => {
                assert!(args.noinput);
                assert!(args.delete_unhashed_files);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_resource_kind() {
        let cli = Cli::try_parse_from(["dog-assets", "size", "media/a.txt", "--kind", "raw"]).unwrap();
        match cli.command {
            Command::Size(args) => assert_eq!(args.kind, ResourceKind::Raw),
            other => panic!("unexpected command {other:?}"),
        }
        assert!(Cli::try_parse_from(["dog-assets", "size", "a", "--kind", "audio"]).is_err());
    }
}
