use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::error::{RenderError, Result};
use crate::frame::Program;

const LIT: &str = include_str!("shaders/lit.wgsl");
const POSTPROCESS: &str = include_str!("shaders/postprocess.wgsl");
const SCREEN: &str = include_str!("shaders/screen.wgsl");

/// WGSL sources of every program, each with `vs_main` and `fs_main` entry points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSet {
    pub lit: String,
    pub postprocess: String,
    pub screen: String,
}

impl Default for ShaderSet {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ShaderSet {
    pub fn builtin() -> Self {
        Self {
            lit: LIT.to_string(),
            postprocess: POSTPROCESS.to_string(),
            screen: SCREEN.to_string(),
        }
    }

    /// Reads `<dir>/<program>.wgsl` for each program, falling back to the
    /// builtin source when a file is absent.
    pub fn load(dir: Option<&Path>) -> Result<Self> {
        let mut set = Self::builtin();
        if let Some(dir) = dir {
            for program in Program::ALL {
                let path = dir.join(format!("{}.wgsl", program.name()));
                if path.is_file() {
                    *set.source_mut(program) = read_source(&path)?;
                    info!("using {} for the {} program", path.display(), program.name());
                }
            }
        }
        set.validate()?;
        Ok(set)
    }

    pub fn source(&self, program: Program) -> &str {
        match program {
            Program::Lit => &self.lit,
            Program::PostProcess => &self.postprocess,
            Program::Screen => &self.screen,
        }
    }

    fn source_mut(&mut self, program: Program) -> &mut String {
        match program {
            Program::Lit => &mut self.lit,
            Program::PostProcess => &mut self.postprocess,
            Program::Screen => &mut self.screen,
        }
    }

    /// Checks that every program exposes both entry points.
    pub fn validate(&self) -> Result<()> {
        for program in Program::ALL {
            let source = self.source(program);
            for entry in ["fn vs_main", "fn fs_main"] {
                if !source.contains(entry) {
                    return Err(RenderError::Shader {
                        program: program.name().to_string(),
                        message: format!("missing entry point `{}`", &entry[3..]),
                    });
                }
            }
            debug!("{} program: {} bytes of WGSL", program.name(), source.len());
        }
        Ok(())
    }
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| RenderError::Io {
        path: PathBuf::from(path),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_programs_are_complete() {
        ShaderSet::builtin().validate().unwrap();
    }

    #[test]
    fn directory_overrides_single_program() {
        let dir = tempfile::tempdir().unwrap();
        let custom = "@vertex fn vs_main() {}\n@fragment fn fs_main() {}\n";
        fs::write(dir.path().join("screen.wgsl"), custom).unwrap();

        let set = ShaderSet::load(Some(dir.path())).unwrap();
        assert_eq!(set.screen, custom);
        assert_eq!(set.lit, LIT);
    }

    #[test]
    fn program_without_entry_point_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("lit.wgsl"), "@vertex fn vs_main() {}\n").unwrap();
        let err = ShaderSet::load(Some(dir.path())).unwrap_err();
        assert!(matches!(err, RenderError::Shader { ref program, .. } if program == "lit"));
    }
}
