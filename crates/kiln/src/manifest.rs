use std::fmt;

use hashbrown::DefaultHashBuilder;

use indexmap::{IndexMap, IndexSet};

use serde::Serialize;

/// A library the generated program depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Library {
    /// Library name.
    pub name: String,
    /// Requested version, if pinned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Source repository, if fetched from one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
}

impl Library {
    /// Creates a [`Library`] with an optional pinned version.
    #[must_use]
    pub fn new(name: impl Into<String>, version: Option<&str>) -> Self {
        Self {
            name: name.into(),
            version: version.map(str::to_string),
            repository: None,
        }
    }

    /// Parses a library written as `name`, `name@version`, or as a
    /// repository URL.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if text.contains("://") {
            let (repository, version) = match text.rsplit_once('#') {
                Some((repository, reference)) => (repository, Some(reference.to_string())),
                None => (text, None),
            };
            let name = repository
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .unwrap_or(repository)
                .trim_end_matches(".git");
            return Self {
                name: name.to_string(),
                version,
                repository: Some(repository.to_string()),
            };
        }
        match text.split_once('@') {
            Some((name, version)) => Self::new(name.trim(), Some(version.trim())),
            None => Self::new(text, None),
        }
    }
}

impl fmt::Display for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(repository) = &self.repository {
            write!(f, "={repository}")?;
        }
        if let Some(version) = &self.version {
            write!(f, "@{version}")?;
        }
        Ok(())
    }
}

/// The contributions of the generated program to the downstream build.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Manifest {
    libraries: Vec<Library>,
    defines: IndexMap<String, Option<String>, DefaultHashBuilder>,
    build_flags: IndexSet<String, DefaultHashBuilder>,
    source_files: IndexSet<String, DefaultHashBuilder>,
}

impl Manifest {
    /// Creates an empty [`Manifest`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a library.
    ///
    /// A request for a library already present is merged with it: a
    /// repository wins over a named library, a pinned version wins over an
    /// unpinned request.
    ///
    /// # Errors
    ///
    /// Fails when both requests pin different versions or repositories.
    pub fn add_library(&mut self, library: Library) -> Result<(), String> {
        let mut index = 0;
        while index < self.libraries.len() {
            let other = &self.libraries[index];
            if other.name != library.name {
                index += 1;
                continue;
            }

            if let Some(repository) = &other.repository {
                if library.repository.is_none() || library.repository.as_ref() == Some(repository)
                {
                    return Ok(());
                }
                return Err(format!(
                    "Adding named Library with repository failed! Libraries {library} and {other} requested with conflicting repositories!"
                ));
            }
            if library.repository.is_some() || other.version.is_none() {
                let _ = self.libraries.remove(index);
                continue;
            }
            if library.version.is_none() || other.version == library.version {
                return Ok(());
            }
            return Err(format!(
                "Version pinning failed! Libraries {library} and {other} requested with conflicting versions!"
            ));
        }

        tracing::debug!("Adding library {library}");
        self.libraries.push(library);
        Ok(())
    }

    /// Adds a preprocessor define.
    ///
    /// # Errors
    ///
    /// Fails when the define was added before with another value.
    pub fn add_define(&mut self, name: &str, value: Option<String>) -> Result<(), String> {
        match self.defines.get(name) {
            Some(existing) if *existing == value => Ok(()),
            Some(existing) => Err(format!(
                "Define {name} requested with conflicting values {} and {}",
                existing.as_deref().unwrap_or("<none>"),
                value.as_deref().unwrap_or("<none>")
            )),
            None => {
                let _ = self.defines.insert(name.to_string(), value);
                Ok(())
            }
        }
    }

    /// Adds a compiler flag.
    pub fn add_build_flag(&mut self, flag: impl Into<String>) {
        let _ = self.build_flags.insert(flag.into());
    }

    /// Adds a source file copied next to the generated program.
    pub fn add_source_file(&mut self, path: impl Into<String>) {
        let _ = self.source_files.insert(path.into());
    }

    /// Returns the libraries.
    #[must_use]
    pub fn libraries(&self) -> &[Library] {
        &self.libraries
    }

    /// Returns the defines.
    #[must_use]
    pub fn defines(&self) -> &IndexMap<String, Option<String>, DefaultHashBuilder> {
        &self.defines
    }

    /// Returns the compiler flags.
    pub fn build_flags(&self) -> impl Iterator<Item = &str> {
        self.build_flags.iter().map(String::as_str)
    }

    /// Returns the source files.
    pub fn source_files(&self) -> impl Iterator<Item = &str> {
        self.source_files.iter().map(String::as_str)
    }

    /// Returns the defines as compiler flags, followed by the build flags.
    #[must_use]
    pub fn compiler_flags(&self) -> Vec<String> {
        self.defines
            .iter()
            .map(|(name, value)| match value {
                Some(value) => format!("-D{name}={value}"),
                None => format!("-D{name}"),
            })
            .chain(self.build_flags.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::serialize;

    use super::{Library, Manifest};

    #[test]
    fn library_forms() {
        assert_eq!(
            Library::parse("Wire@2.0.0"),
            Library::new("Wire", Some("2.0.0"))
        );
        assert_eq!(Library::parse("SPI"), Library::new("SPI", None));

        let git = Library::parse("https://github.com/example/FastLED.git#v3.6");
        assert_eq!(git.name, "FastLED");
        assert_eq!(git.version.as_deref(), Some("v3.6"));
        assert_eq!(
            git.repository.as_deref(),
            Some("https://github.com/example/FastLED.git")
        );
    }

    #[test]
    fn version_pinning() {
        let mut manifest = Manifest::new();
        manifest.add_library(Library::new("Wire", None)).unwrap();
        manifest
            .add_library(Library::new("Wire", Some("2.0.0")))
            .unwrap();
        // An unversioned request never displaces a pinned one.
        manifest.add_library(Library::new("Wire", None)).unwrap();
        manifest
            .add_library(Library::new("Wire", Some("2.0.0")))
            .unwrap();

        assert_eq!(manifest.libraries(), [Library::new("Wire", Some("2.0.0"))]);

        let error = manifest
            .add_library(Library::new("Wire", Some("3.0.0")))
            .unwrap_err();
        assert!(error.starts_with("Version pinning failed!"));
    }

    #[test]
    fn repositories() {
        let mut manifest = Manifest::new();
        manifest
            .add_library(Library::new("FastLED", Some("3.5.0")))
            .unwrap();
        manifest
            .add_library(Library::parse("https://github.com/example/FastLED"))
            .unwrap();
        manifest
            .add_library(Library::new("FastLED", Some("3.6.0")))
            .unwrap();

        assert_eq!(manifest.libraries().len(), 1);
        assert!(manifest.libraries()[0].repository.is_some());

        let error = manifest
            .add_library(Library::parse("https://github.com/other/FastLED"))
            .unwrap_err();
        assert!(error.starts_with("Adding named Library with repository failed!"));
    }

    #[test]
    fn defines_and_flags() {
        let mut manifest = Manifest::new();
        manifest.add_define("USE_SENSOR", None).unwrap();
        manifest.add_define("USE_SENSOR", None).unwrap();
        manifest
            .add_define("ESPHOME_LOG_LEVEL", Some("ESPHOME_LOG_LEVEL_DEBUG".into()))
            .unwrap();
        manifest.add_build_flag("-Wno-unused-variable");
        manifest.add_build_flag("-Wno-unused-variable");

        assert!(
            manifest
                .add_define("ESPHOME_LOG_LEVEL", Some("ESPHOME_LOG_LEVEL_INFO".into()))
                .is_err()
        );
        assert_eq!(
            manifest.compiler_flags(),
            [
                "-DUSE_SENSOR",
                "-DESPHOME_LOG_LEVEL=ESPHOME_LOG_LEVEL_DEBUG",
                "-Wno-unused-variable",
            ]
        );
    }

    #[test]
    fn serialized_shape() {
        let mut manifest = Manifest::new();
        manifest
            .add_library(Library::new("Wire", Some("2.0.0")))
            .unwrap();
        manifest.add_define("USE_I2C", None).unwrap();
        manifest.add_source_file("my_component.h");

        assert_eq!(
            serialize(manifest),
            json!({
                "libraries": [{ "name": "Wire", "version": "2.0.0" }],
                "defines": { "USE_I2C": null },
                "build_flags": [],
                "source_files": ["my_component.h"],
            })
        );
    }
}
