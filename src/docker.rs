//! Container-runtime CLI wrapper and the content-addressed build cache.
//!
//! The runtime is an external collaborator reached through its CLI; nothing
//! here links a client library. Cache identity is the digest of build
//! inputs, attached to images as a label at build time.
use crate::util::{sha256_hex, truncate_bytes};
use anyhow::{anyhow, Context, Result};
use std::path::Path;
use std::process::{Command, Stdio};

pub const INPUTS_LABEL: &str = "drydock.inputs";

const STDERR_PREVIEW_BYTES: usize = 2048;

/// Configured container CLI, e.g. `docker` or `sudo docker`.
pub struct DockerCli {
    argv: Vec<String>,
}

impl DockerCli {
    pub fn new(argv: Vec<String>) -> Result<Self> {
        let program = argv
            .first()
            .ok_or_else(|| anyhow!("container command is empty; set DRYDOCK_DOCKER or fix drydock.json"))?;
        if !program.contains(std::path::MAIN_SEPARATOR) {
            which::which(program).with_context(|| {
                format!("locate `{program}` on PATH (install it or set DRYDOCK_DOCKER)")
            })?;
        }
        Ok(Self { argv })
    }

    pub fn describe(&self) -> String {
        self.argv.join(" ")
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.argv[0]);
        command.args(&self.argv[1..]);
        command
    }

    fn capture(&self, args: &[&str]) -> Result<String> {
        let rendered = format!("{} {}", self.describe(), args.join(" "));
        let output = self
            .command()
            .args(args)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("run `{rendered}`"))?;
        if !output.status.success() {
            return Err(anyhow!(
                "`{rendered}` failed: {}",
                truncate_bytes(&output.stderr, STDERR_PREVIEW_BYTES).trim()
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Local image identifiers, deduplicated across tags.
    pub fn image_ids(&self) -> Result<Vec<String>> {
        let stdout = self.capture(&["image", "ls", "--format", "{{.ID}}"])?;
        let mut ids: Vec<String> = stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    /// The inputs label of each image, one line per id; unlabeled images
    /// yield a non-matching placeholder.
    pub fn inspect_input_labels(&self, ids: &[String]) -> Result<Vec<String>> {
        let format = format!("{{{{ index .Config.Labels \"{INPUTS_LABEL}\" }}}}");
        let mut args = vec!["inspect", "--format", format.as_str()];
        args.extend(ids.iter().map(String::as_str));
        let stdout = self.capture(&args)?;
        Ok(stdout.lines().map(|line| line.trim().to_string()).collect())
    }

    /// Run `build`, attaching the inputs digest as a label. Build output
    /// streams straight through to the user.
    pub fn build(
        &self,
        dockerfile: &Path,
        context_dir: &Path,
        tag: &str,
        digest: &str,
    ) -> Result<()> {
        let label = format!("{INPUTS_LABEL}={digest}");
        let status = self
            .command()
            .arg("build")
            .arg("-f")
            .arg(dockerfile)
            .arg("--label")
            .arg(&label)
            .arg("-t")
            .arg(tag)
            .arg(context_dir)
            .status()
            .with_context(|| format!("run `{} build`", self.describe()))?;
        if !status.success() {
            return Err(anyhow!(
                "`{} build` failed with {status}; inspect the build output above",
                self.describe()
            ));
        }
        Ok(())
    }
}

/// Content-addressable map from build inputs to an already-built image.
pub struct BuildCache<'a> {
    docker: &'a DockerCli,
}

impl<'a> BuildCache<'a> {
    pub fn new(docker: &'a DockerCli) -> Self {
        Self { docker }
    }

    /// Cache key: digest of definition bytes followed by lockfile bytes.
    /// Files copied into the image are intentionally outside the key.
    pub fn digest(definition: &[u8], lock: &[u8]) -> String {
        let mut bytes = Vec::with_capacity(definition.len() + lock.len());
        bytes.extend_from_slice(definition);
        bytes.extend_from_slice(lock);
        sha256_hex(&bytes)
    }

    /// First image whose inputs label matches the digest exactly.
    pub fn lookup(&self, digest: &str) -> Result<Option<String>> {
        let ids = self.docker.image_ids()?;
        if ids.is_empty() {
            return Ok(None);
        }
        let labels = self.docker.inspect_input_labels(&ids)?;
        Ok(ids
            .into_iter()
            .zip(labels)
            .find(|(_, label)| label == digest)
            .map(|(id, _)| id))
    }
}
