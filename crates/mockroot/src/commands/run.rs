use crate::cli::RunArgs;
use mockroot_core::{CommandHost, HostConfig, MockWorkspace};
use tracing::instrument;

/// Build the workspace described by `args`, run the command and return its
/// exit code.
///
/// Host commands are blocking, so the workspace is built on the blocking
/// pool; only the command itself runs on the async runtime.
#[instrument(skip_all, fields(unit = %args.unit))]
pub async fn execute(args: RunArgs) -> miette::Result<i32> {
    let Some((program, rest)) = args.command.split_first() else {
        return Err(miette::miette!("no command given"));
    };
    let (program, rest) = (program.clone(), rest.to_vec());

    let span = tracing::Span::current();
    let mut workspace = tokio::task::spawn_blocking(move || {
        let _entered = span.enter();
        prepare(args)
    })
    .await
    .map_err(|e| miette::miette!("workspace preparation did not complete: {e}"))??;

    let code = workspace.run(&program, &rest).await?;
    workspace.close()?;
    Ok(code)
}

/// Load the host, then apply configuration, exclusions and links before the
/// unit is added, so exclusions hold for every dependency reached afterwards.
#[allow(clippy::print_stderr)]
fn prepare(args: RunArgs) -> miette::Result<MockWorkspace> {
    let host_config = HostConfig::load(&args.host_config)?;
    tracing::debug!(path = %args.host_config.display(), "Loaded host configuration");
    let mut workspace = MockWorkspace::new(Box::new(CommandHost::new(host_config)))?;

    if args.keep_work {
        eprintln!("WORK={}", workspace.retain().display());
    }
    if args.no_translate {
        workspace.disable_translation();
    }
    if let Some(path) = &args.config {
        workspace.load_config(path)?;
    }

    for id in args.excludes {
        workspace.exclude(id);
    }
    if let Some(path) = &args.exclude_from {
        workspace.exclude_from_file(path)?;
    }

    for id in &args.links {
        workspace.link_dependency(id)?;
    }
    if let Some(path) = &args.link_from {
        workspace.link_from_file(path)?;
    }

    workspace.add_unit(&args.unit)?;
    workspace.drain()?;
    Ok(workspace)
}
