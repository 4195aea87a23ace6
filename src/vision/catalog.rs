//! Template catalog loaded once at startup from a JSON manifest.
//!
//! ```json
//! {
//!   "templates": {
//!     "CHEER_IMAGE": { "path": "cheer.png", "threshold": 0.8,
//!                      "region": { "start_x": 1486, "start_y": 1699, "width": 700, "height": 220 } }
//!   },
//!   "characters": [ { "name": "Rapi", "path": "characters/rapi.png", "threshold": 0.85 } ]
//! }
//! ```
//!
//! Paths are relative to the manifest. Regions are in reference resolution.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context};
use serde::Deserialize;
use tracing::info;

use super::Template;
use crate::capture::Region;
use crate::error::{CollectorError, Result};

fn default_threshold() -> f32 {
    0.8
}

#[derive(Debug, Deserialize)]
struct TemplateEntry {
    path: String,
    #[serde(default = "default_threshold")]
    threshold: f32,
    #[serde(default)]
    region: Option<Region>,
}

#[derive(Debug, Deserialize)]
struct CharacterEntry {
    name: String,
    path: String,
    #[serde(default = "default_threshold")]
    threshold: f32,
}

#[derive(Debug, Default, Deserialize)]
struct Manifest {
    #[serde(default)]
    templates: BTreeMap<String, TemplateEntry>,
    #[serde(default)]
    characters: Vec<CharacterEntry>,
}

/// Immutable set of UI templates and character icons.
#[derive(Debug, Default)]
pub struct TemplateCatalog {
    templates: BTreeMap<String, Template>,
    characters: Vec<Template>,
}

impl TemplateCatalog {
    pub fn new(templates: Vec<Template>, characters: Vec<Template>) -> Self {
        Self {
            templates: templates.into_iter().map(|t| (t.key.clone(), t)).collect(),
            characters,
        }
    }

    /// Reads the manifest and every image it references.
    pub fn load(manifest_path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(manifest_path)
            .with_context(|| format!("Failed to read template manifest {}", manifest_path.display()))?;
        let manifest: Manifest = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse template manifest {}", manifest_path.display()))?;
        let base = manifest_path.parent().unwrap_or_else(|| Path::new("."));

        let mut templates = Vec::with_capacity(manifest.templates.len());
        for (key, entry) in manifest.templates {
            check_threshold(&key, entry.threshold)?;
            let image = load_image(base, &entry.path)?;
            templates.push(Template::new(key, image, entry.threshold, entry.region));
        }

        let mut characters = Vec::with_capacity(manifest.characters.len());
        for entry in manifest.characters {
            check_threshold(&entry.name, entry.threshold)?;
            let image = load_image(base, &entry.path)?;
            characters.push(Template::new(entry.name, image, entry.threshold, None));
        }

        info!(
            "Loaded {} templates and {} character icons from {}",
            templates.len(),
            characters.len(),
            manifest_path.display()
        );
        Ok(Self::new(templates, characters))
    }

    pub fn get(&self, key: &str) -> Result<&Template> {
        self.templates
            .get(key)
            .ok_or_else(|| CollectorError::UnknownTemplate(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.templates.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    pub fn characters(&self) -> &[Template] {
        &self.characters
    }
}

fn check_threshold(key: &str, threshold: f32) -> anyhow::Result<()> {
    if !(0.0..=1.0).contains(&threshold) {
        bail!("Template '{}' has threshold {} outside 0.0..=1.0", key, threshold);
    }
    Ok(())
}

fn load_image(base: &Path, relative: &str) -> anyhow::Result<image::RgbaImage> {
    let path = base.join(relative);
    Ok(image::open(&path)
        .with_context(|| format!("Failed to load template image {}", path.display()))?
        .to_rgba8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::noise_image;

    #[test]
    fn test_load_manifest() {
        let dir = tempfile::tempdir().unwrap();
        noise_image(20, 10, 1).save(dir.path().join("cheer.png")).unwrap();
        fs::create_dir_all(dir.path().join("characters")).unwrap();
        noise_image(8, 8, 2)
            .save(dir.path().join("characters").join("rapi.png"))
            .unwrap();
        let manifest = r#"{
            "templates": {
                "CHEER_IMAGE": { "path": "cheer.png", "threshold": 0.75,
                                 "region": { "start_x": 1, "start_y": 2, "width": 30, "height": 40 } }
            },
            "characters": [ { "name": "Rapi", "path": "characters/rapi.png" } ]
        }"#;
        let manifest_path = dir.path().join("manifest.json");
        fs::write(&manifest_path, manifest).unwrap();

        let catalog = TemplateCatalog::load(&manifest_path).unwrap();

        let cheer = catalog.get("CHEER_IMAGE").unwrap();
        assert_eq!(cheer.threshold, 0.75);
        assert_eq!(cheer.region, Some(Region::new(1, 2, 30, 40)));
        assert_eq!((cheer.width(), cheer.height()), (20, 10));
        assert_eq!(catalog.characters().len(), 1);
        assert_eq!(catalog.characters()[0].key, "Rapi");
        assert_eq!(catalog.characters()[0].threshold, 0.8);
    }

    #[test]
    fn test_unknown_key() {
        let catalog = TemplateCatalog::default();
        assert!(!catalog.contains("CHEER_IMAGE"));
        assert!(matches!(
            catalog.get("CHEER_IMAGE"),
            Err(CollectorError::UnknownTemplate(_))
        ));
    }

    #[test]
    fn test_rejects_threshold_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        noise_image(4, 4, 1).save(dir.path().join("a.png")).unwrap();
        let manifest_path = dir.path().join("manifest.json");
        fs::write(
            &manifest_path,
            r#"{ "templates": { "A": { "path": "a.png", "threshold": 1.5 } } }"#,
        )
        .unwrap();

        assert!(TemplateCatalog::load(&manifest_path).is_err());
    }
}
