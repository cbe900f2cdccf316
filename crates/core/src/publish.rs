//! Publishing mapper output.
//!
//! A [`Publisher`] receives each mapper's data under its config map name.
//! [`JsonDirPublisher`] writes one JSON object per map into a directory,
//! replacing the previous file atomically so readers never see a partial map.

use std::io::Write;
use std::path::PathBuf;

use tracing::debug;

use crate::errors::PublishError;
use crate::mapper::MapperData;

/// Destination for mapper output.
pub trait Publisher: Send + Sync {
    fn publish(&self, name: &str, data: &MapperData) -> Result<(), PublishError>;
}

/// Writes `<dir>/<name>.json`.
#[derive(Debug, Clone)]
pub struct JsonDirPublisher {
    dir: PathBuf,
}

impl JsonDirPublisher {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path the map `name` is written to.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }
}

impl Publisher for JsonDirPublisher {
    fn publish(&self, name: &str, data: &MapperData) -> Result<(), PublishError> {
        let write_err = |source: std::io::Error| PublishError::Write {
            name: name.to_string(),
            source,
        };

        let body = serde_json::to_vec_pretty(data).map_err(|source| PublishError::Encode {
            name: name.to_string(),
            source,
        })?;

        std::fs::create_dir_all(&self.dir).map_err(write_err)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(write_err)?;
        tmp.write_all(&body).map_err(write_err)?;
        tmp.write_all(b"\n").map_err(write_err)?;

        let path = self.path_for(name);
        tmp.persist(&path).map_err(|e| write_err(e.error))?;

        debug!(name, path = %path.display(), keys = data.len(), "published map");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_writes_json_object() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = JsonDirPublisher::new(dir.path().join("out"));

        let data = MapperData::from([
            ("user.alice".to_string(), r#"["staff"]"#.to_string()),
            ("user.bob".to_string(), "[]".to_string()),
        ]);
        publisher.publish("user-groups-map", &data).unwrap();

        let path = publisher.path_for("user-groups-map");
        assert!(path.ends_with("out/user-groups-map.json"));
        let written: MapperData =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, data);
    }

    #[test]
    fn test_publish_replaces_previous() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = JsonDirPublisher::new(dir.path());

        let first = MapperData::from([("a".to_string(), "1".to_string())]);
        let second = MapperData::from([("b".to_string(), "2".to_string())]);
        publisher.publish("m", &first).unwrap();
        publisher.publish("m", &second).unwrap();

        let written: MapperData =
            serde_json::from_str(&std::fs::read_to_string(publisher.path_for("m")).unwrap())
                .unwrap();
        assert_eq!(written, second);

        // Only the published file remains; no temp files left behind.
        let count = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(count, 1);
    }
}
