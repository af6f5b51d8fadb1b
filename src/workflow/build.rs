//! Workflow docker step: resolve a profile into a definition, then reuse or
//! build the image.
use crate::cli::DockerArgs;
use crate::context::ProjectContext;
use crate::docker::{BuildCache, DockerCli};
use crate::dockerfile;
use crate::profile::{self, BuildStrategy, Catalog, ProfileRequest};
use crate::staging::{commit_staged, StagedWrite};
use crate::util::display_path;
use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

/// Run the docker step.
pub fn run_docker(args: &DockerArgs) -> Result<ExitCode> {
    let ctx = ProjectContext::load(&args.project)?;
    let mut catalog = Catalog::builtin();
    catalog.merge(ctx.config.catalog.clone());

    let request = ProfileRequest {
        profile: args.profile.clone(),
        base_image: args.base_image.clone(),
        system_libs: args.system_libs.clone(),
        packages: args.packages.clone(),
    };
    let strategy = profile::resolve(&catalog, &request, ctx.root())?;
    let definition_path = materialize_definition(&ctx, strategy, args.verbose)?;

    if !args.build {
        println!(
            "definition ready at {}; add --build to produce an image",
            display_path(&definition_path, Some(ctx.root()))
        );
        return Ok(ExitCode::SUCCESS);
    }

    let definition_bytes = fs::read(&definition_path)
        .with_context(|| format!("read {}", definition_path.display()))?;
    let lock_bytes = lockfile_bytes(&ctx)?;
    let digest = BuildCache::digest(&definition_bytes, &lock_bytes);
    if args.verbose {
        eprintln!("build inputs digest {digest}");
    }

    let docker = DockerCli::new(ctx.config.docker.clone())?;
    if !args.force {
        let cache = BuildCache::new(&docker);
        if let Some(image) = cache.lookup(&digest)? {
            println!("cache hit: image {image} already matches this definition and lockfile");
            return Ok(ExitCode::SUCCESS);
        }
    }

    let tag = args
        .tag
        .clone()
        .unwrap_or_else(|| format!("drydock-{}:latest", ctx.image_name()));
    docker.build(&definition_path, ctx.root(), &tag, &digest)?;
    println!("built {tag}");
    Ok(ExitCode::SUCCESS)
}

/// Write a generated definition into the project, or point at the static one.
fn materialize_definition(
    ctx: &ProjectContext,
    strategy: BuildStrategy,
    verbose: bool,
) -> Result<PathBuf> {
    match strategy {
        BuildStrategy::UseStaticDefinition(path) => {
            if verbose {
                eprintln!("using static definition {}", path.display());
            }
            Ok(path)
        }
        BuildStrategy::GenerateDefinition(spec) => {
            let text = dockerfile::generate(&spec);
            let path = ctx.dockerfile_path();
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create {}", parent.display()))?;
            }
            commit_staged(
                ctx.root(),
                &[StagedWrite {
                    path: path.clone(),
                    bytes: text.into_bytes(),
                }],
            )?;
            println!("wrote {}", display_path(&path, Some(ctx.root())));
            Ok(path)
        }
    }
}

/// Lockfile bytes exactly as they participate in the cache key: the on-disk
/// file when present, otherwise a fresh empty lockfile.
fn lockfile_bytes(ctx: &ProjectContext) -> Result<Vec<u8>> {
    let path = ctx.lockfile_path();
    if path.is_file() {
        return fs::read(&path).with_context(|| format!("read {}", path.display()));
    }
    Ok(ctx.lockfile_or_empty()?.render()?.into_bytes())
}
