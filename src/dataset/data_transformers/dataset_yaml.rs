use crate::dataset::iterator_adapters::splitting::Split;
use crate::dataset::storage::DatasetStorage;
use crate::error::DatasetError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

pub const DATASET_YAML_FILE_NAME: &str = "dataset.yaml";

/// The `dataset.yaml` consumed by YOLO training tools
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetDescriptor {
    pub path: String,
    pub train: String,
    pub val: String,
    pub test: String,
    pub nc: usize,
    pub names: BTreeMap<u32, String>,
}

fn images_dir(split: Split) -> String {
    format!("{}/images", split.dir_name())
}

/// Class `i` is named `class_names[i]` if given, `class_<i>` otherwise.
/// Ids run from 0 up to the highest id seen or named.
pub fn build_descriptor(
    output_root: &Path,
    class_names: &[String],
    classes_seen: &BTreeSet<u32>,
) -> DatasetDescriptor {
    let named = class_names.len() as u32;
    let class_count = classes_seen
        .iter()
        .next_back()
        .map(|max| (max + 1).max(named))
        .unwrap_or(named);
    let names = (0..class_count)
        .map(|id| {
            let name = class_names
                .get(id as usize)
                .cloned()
                .unwrap_or_else(|| format!("class_{}", id));
            (id, name)
        })
        .collect::<BTreeMap<_, _>>();
    DatasetDescriptor {
        path: output_root.to_string_lossy().into_owned(),
        train: images_dir(Split::Train),
        val: images_dir(Split::Val),
        test: images_dir(Split::Test),
        nc: names.len(),
        names,
    }
}

pub fn write_dataset_yaml<S: DatasetStorage + ?Sized>(
    storage: &S,
    output_root: &Path,
    descriptor: &DatasetDescriptor,
) -> Result<PathBuf, DatasetError> {
    let yaml =
        serde_yaml::to_string(descriptor).map_err(|e| DatasetError::Serialization(e.to_string()))?;
    let path = output_root.join(DATASET_YAML_FILE_NAME);
    storage
        .write(&path, yaml.as_bytes())
        .map_err(|source| DatasetError::Io {
            path: path.clone(),
            source,
        })?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::storage::MemoryStorage;

    #[test]
    fn unnamed_classes_get_placeholders() {
        let seen = vec![0, 3].into_iter().collect();
        let descriptor =
            build_descriptor(Path::new("out"), &["person".to_string()], &seen);
        assert_eq!(descriptor.nc, 4);
        assert_eq!(descriptor.names[&0], "person");
        assert_eq!(descriptor.names[&1], "class_1");
        assert_eq!(descriptor.names[&3], "class_3");
        assert_eq!(descriptor.train, "train/images");
    }

    #[test]
    fn names_cover_configured_classes_not_seen() {
        let names = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let seen = vec![0].into_iter().collect();
        let descriptor = build_descriptor(Path::new("out"), &names, &seen);
        assert_eq!(descriptor.nc, 3);
        assert_eq!(descriptor.names[&2], "c");
    }

    #[test]
    fn written_yaml_parses_back() {
        let storage = MemoryStorage::new();
        storage.create_dir_all(Path::new("out")).unwrap();
        let descriptor = build_descriptor(Path::new("out"), &[], &vec![1].into_iter().collect());
        let path = write_dataset_yaml(&storage, Path::new("out"), &descriptor).unwrap();
        assert_eq!(path, PathBuf::from("out/dataset.yaml"));
        let parsed: DatasetDescriptor =
            serde_yaml::from_slice(&storage.get(&path).unwrap()).unwrap();
        assert_eq!(parsed, descriptor);
        assert_eq!(parsed.names[&0], "class_0");
    }
}
