//! Build-environment variables handed to external tools
//!
//! The target platform reaches the build script and the archive packager as
//! environment context rather than through process-wide state.

use crate::core::{definition::ArtifactKind, targets::Target};

/// Variable carrying the target operating system
pub const OS_VAR: &str = "GOOS";
/// Variable carrying the target CPU architecture
pub const ARCH_VAR: &str = "GOARCH";
/// Variable carrying the artifact kind being built
pub const KIND_VAR: &str = "CNB_ARTIFACT_KIND";

/// Environment for one build step: the artifact kind and, when given, the target platform
pub fn build_environment(kind: ArtifactKind, target: Option<&Target>) -> Vec<(String, String)> {
    let mut vars = vec![(KIND_VAR.to_string(), kind.as_str().to_string())];
    if let Some(target) = target {
        vars.push((OS_VAR.to_string(), target.os.clone()));
        vars.push((ARCH_VAR.to_string(), target.arch.clone()));
    }
    vars
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untargeted_environment_only_has_kind() {
        let vars = build_environment(ArtifactKind::Extension, None);
        assert_eq!(
            vars,
            vec![("CNB_ARTIFACT_KIND".to_string(), "extension".to_string())]
        );
    }

    #[test]
    fn test_targeted_environment() {
        let target = Target::new("linux", "arm64");
        let vars = build_environment(ArtifactKind::Buildpack, Some(&target));
        assert_eq!(
            vars,
            vec![
                ("CNB_ARTIFACT_KIND".to_string(), "buildpack".to_string()),
                ("GOOS".to_string(), "linux".to_string()),
                ("GOARCH".to_string(), "arm64".to_string()),
            ]
        );
    }
}
