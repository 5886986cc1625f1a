use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use dog_assets::{
    collect_orphaned_media, collect_redundant_static, AssetsConfig, CloudinaryClient,
    CollectOptions, ConfigHandle, Confirmation, HashedStaticStorage, MediaStorages,
    ReconcileReport, ReferenceSet, RemoteApi, StaticStorage,
};

use crate::cli::*;

/// Configuration from `path` (when given) overlaid with the environment
pub fn load_config(path: Option<&Path>) -> anyhow::Result<AssetsConfig> {
    tracing::debug!(path = ?path, "loading configuration");
    let config = match path {
        Some(path) => AssetsConfig::from_file(path)?.with_env_overrides()?,
        None => AssetsConfig::from_env()?,
    };
    Ok(config)
}

struct App {
    config: ConfigHandle,
    remote: Arc<dyn RemoteApi>,
}

impl App {
    fn new(config: AssetsConfig) -> anyhow::Result<Self> {
        let remote: Arc<dyn RemoteApi> = Arc::new(CloudinaryClient::new(&config)?);
        Ok(Self {
            config: ConfigHandle::new(config)?,
            remote,
        })
    }

    fn media(&self) -> MediaStorages {
        MediaStorages::new(self.remote.clone(), self.config.clone())
    }

    fn statics(&self) -> StaticStorage {
        StaticStorage::new(self.remote.clone(), self.config.clone())
    }

    fn hashed(&self) -> HashedStaticStorage {
        HashedStaticStorage::from_storage(self.statics())
    }
}

fn confirmation(noinput: bool) -> Confirmation {
    if noinput {
        Confirmation::NoInput
    } else {
        Confirmation::stdin()
    }
}

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let ctx = App::new(load_config(cli.config.as_deref())?)?;
    match cli.command {
        Command::Collectstatic(args) => cmd_collectstatic(&ctx, args).await,
        Command::Deleteorphanedmedia(args) => cmd_delete_orphaned_media(&ctx, args).await,
        Command::Deleteredundantstatic(args) => cmd_delete_redundant_static(&ctx, args).await,
        Command::Url(args) => cmd_url(&ctx, args).await,
        Command::Exists(args) => cmd_exists(&ctx, args).await,
        Command::Size(args) => cmd_size(&ctx, args).await,
        Command::Ls(args) => cmd_ls(&ctx, args).await,
    }
}

async fn cmd_collectstatic(ctx: &App, args: CollectArgs) -> anyhow::Result<()> {
    let report = ctx
        .hashed()
        .collect(CollectOptions {
            upload_unhashed: args.upload_unhashed_files,
            dry_run: args.dry_run,
        })
        .await?;
    for processed in &report.post_processed {
        println!("Post-processed '{}' as '{}'", processed.original, processed.hashed);
    }
    println!("\n{}", report.summary());
    Ok(())
}

async fn cmd_delete_orphaned_media(ctx: &App, args: OrphanedArgs) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(&args.references)
        .with_context(|| format!("cannot read {}", args.references.display()))?;
    let references = ReferenceSet::from_json(&content)?;
    let exclude_paths = ctx.config.current().exclude_delete_orphaned_media_paths.clone();

    let report = collect_orphaned_media(
        &ctx.media(),
        &references,
        &exclude_paths,
        &confirmation(args.noinput),
    )
    .await?;
    print_report(&report)
}

async fn cmd_delete_redundant_static(ctx: &App, args: RedundantArgs) -> anyhow::Result<()> {
    let report = collect_redundant_static(
        &ctx.hashed(),
        &confirmation(args.noinput),
        !args.delete_unhashed_files,
    )
    .await?;
    print_report(&report)
}

fn print_report(report: &ReconcileReport) -> anyhow::Result<()> {
    for failure in &report.failed {
        eprintln!("Failed to delete {} ({}): {}", failure.public_id, failure.kind, failure.message);
    }
    println!("{}", report.status_line());
    if !report.is_success() {
        bail!("{} files could not be deleted", report.failed.len());
    }
    Ok(())
}

async fn cmd_url(ctx: &App, args: ObjectArgs) -> anyhow::Result<()> {
    let url = if args.static_file {
        ctx.hashed().url(&args.name).await?
    } else {
        ctx.media().get(args.kind).url(&args.name)
    };
    println!("{url}");
    Ok(())
}

async fn cmd_exists(ctx: &App, args: ObjectArgs) -> anyhow::Result<()> {
    let exists = if args.static_file {
        ctx.statics().exists(&args.name).await?
    } else {
        ctx.media().get(args.kind).exists(&args.name).await?
    };
    println!("{exists}");
    Ok(())
}

async fn cmd_size(ctx: &App, args: ObjectArgs) -> anyhow::Result<()> {
    let size = if args.static_file {
        ctx.statics().size(&args.name).await?
    } else {
        ctx.media().get(args.kind).size(&args.name).await?
    };
    match size {
        Some(size) => println!("{size}"),
        None => bail!("no size reported for {}", args.name),
    }
    Ok(())
}

async fn cmd_ls(ctx: &App, args: ListArgs) -> anyhow::Result<()> {
    let (directories, files) = ctx.media().get(args.kind).listdir(&args.path).await?;
    for directory in directories {
        println!("{directory}/");
    }
    for file in files {
        println!("{file}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("assets.toml");
        std::fs::write(
            &path,
            r#"
cloud_name = "demo"
api_key = "key"
api_secret = "secret"
static_tag = "build"
"#,
        )
        .unwrap();

        let config = load_config(Some(path.as_path())).unwrap();
        assert_eq!(config.static_tag, "build");
        assert_eq!(config.media_tag, "media");
    }

    #[test]
    fn test_load_config_reports_missing_file() {
        let err = load_config(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(err.to_string().contains("cannot read"), "{err}");
    }
}
