//! Build-definition generation from a resolved profile.
//!
//! Output is deterministic: identical inputs produce byte-identical text, so
//! the build cache can key on content alone.
use crate::profile::GenerateSpec;

pub const CRAN_MIRROR: &str = "https://cloud.r-project.org";

/// Render a Dockerfile for the given spec.
pub fn generate(spec: &GenerateSpec) -> String {
    let mut out = String::new();
    out.push_str(&format!("FROM {}\n", spec.base_image));

    if !spec.system_libs.is_empty() {
        out.push('\n');
        out.push_str("RUN apt-get update \\\n");
        out.push_str(" && apt-get install -y --no-install-recommends \\\n");
        for lib in &spec.system_libs {
            out.push_str(&format!("    {lib} \\\n"));
        }
        out.push_str(" && rm -rf /var/lib/apt/lists/*\n");
    }

    out.push('\n');
    out.push_str(&format!(
        "RUN R -q -e 'install.packages(\"renv\", repos = \"{CRAN_MIRROR}\")'\n"
    ));

    if !spec.packages.is_empty() {
        let quoted: Vec<String> = spec
            .packages
            .iter()
            .map(|package| format!("\"{package}\""))
            .collect();
        out.push('\n');
        out.push_str(&format!(
            "RUN R -q -e 'install.packages(c({}), repos = \"{CRAN_MIRROR}\")'\n",
            quoted.join(", ")
        ));
    }

    out.push('\n');
    out.push_str("WORKDIR /home/project\n");
    out.push_str("COPY DESCRIPTION renv.lock ./\n");
    out.push_str("RUN R -q -e 'renv::restore(prompt = FALSE)'\n");
    out.push('\n');
    out.push_str("CMD [\"R\"]\n");
    out
}
