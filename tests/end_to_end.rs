use image::{DynamicImage, RgbImage};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::path::Path;
use yolo_prep::config::AugmentConfig;
use yolo_prep::dataset::augment_pipeline::DatasetAugmenter;
use yolo_prep::dataset::data_augmenters::image_augmentations::AugmentationPipeline;
use yolo_prep::dataset::iterator_adapters::splitting::Split;
use yolo_prep::dataset::label_files::parse_label_file;
use yolo_prep::dataset::storage::FsStorage;
use yolo_prep::error::DatasetError;

fn write_frames(root: &Path, video: &str, count: usize) {
    let frames = root.join("frames").join(video);
    let annotations = root.join("annotations").join(video);
    fs::create_dir_all(&frames).unwrap();
    fs::create_dir_all(&annotations).unwrap();
    for i in 0..count {
        let img = RgbImage::from_fn(64, 48, |x, y| image::Rgb([x as u8 * 3, y as u8 * 4, 90]));
        DynamicImage::ImageRgb8(img)
            .save(frames.join(format!("frame_{:06}.png", i)))
            .unwrap();
        fs::write(
            annotations.join(format!("frame_{:06}.txt", i)),
            "0 0.5 0.5 0.3 0.3\n2 0.25 0.75 0.1 0.1\n",
        )
        .unwrap();
    }
}

fn config(root: &Path, augment_count: usize) -> AugmentConfig {
    AugmentConfig {
        image_root: root.join("frames"),
        annotation_root: root.join("annotations"),
        output_root: root.join("augmented"),
        augment_count,
        ..AugmentConfig::default()
    }
}

fn files_in(dir: &Path) -> Vec<String> {
    let mut names = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect::<Vec<_>>();
    names.sort();
    names
}

#[test]
fn splits_and_augments_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    write_frames(dir.path(), "video1", 10);
    // no annotation for this one
    let orphan = dir.path().join("frames/video1/frame_999999.png");
    DynamicImage::ImageRgb8(RgbImage::new(8, 8)).save(&orphan).unwrap();

    let cfg = config(dir.path(), 2);
    let augmenter = AugmentationPipeline::new(cfg.transforms.clone()).unwrap();
    let report = DatasetAugmenter::new(&cfg, &FsStorage, augmenter)
        .run(&mut StdRng::seed_from_u64(7))
        .unwrap();

    assert_eq!(report.pairs_found, 10);
    assert_eq!(report.unmatched_images.len(), 1);
    assert_eq!(report.split(Split::Train).unwrap().processed, 7);
    assert_eq!(report.split(Split::Val).unwrap().processed, 1);
    assert_eq!(report.split(Split::Test).unwrap().processed, 2);

    for split in Split::ALL.iter() {
        let split_dir = cfg.output_root.join(split.dir_name());
        let labels = files_in(&split_dir.join("labels"));
        let images = files_in(&split_dir.join("images"));
        assert_eq!(labels.len(), images.len());
        for label in labels {
            let stem = label.trim_end_matches(".txt");
            assert!(images.contains(&format!("{}.png", stem)));
            let contents = fs::read_to_string(split_dir.join("labels").join(&label)).unwrap();
            let bbs = parse_label_file(&contents);
            assert!(!bbs.is_empty());
            assert!(bbs.iter().all(|bb| bb.is_normalized()));
        }
        let split_report = report.split(*split).unwrap();
        assert_eq!(
            images.len(),
            split_report.processed + split_report.augmented_written
        );
    }
    assert!(cfg.output_root.join("dataset.yaml").is_file());
    assert!(cfg.output_root.join("augment_report.json").is_file());
}

#[test]
fn empty_input_fails_without_output() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("frames")).unwrap();
    let cfg = config(dir.path(), 3);
    let augmenter = AugmentationPipeline::new(cfg.transforms.clone()).unwrap();
    let result = DatasetAugmenter::new(&cfg, &FsStorage, augmenter)
        .run(&mut StdRng::seed_from_u64(7));
    assert!(matches!(result, Err(DatasetError::NoInput { .. })));
    assert!(!cfg.output_root.exists());
}

#[test]
fn missing_image_root_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), 3);
    let augmenter = AugmentationPipeline::new(cfg.transforms.clone()).unwrap();
    let result = DatasetAugmenter::new(&cfg, &FsStorage, augmenter)
        .run(&mut StdRng::seed_from_u64(7));
    assert!(matches!(result, Err(DatasetError::UnreadableRoot { .. })));
}

#[test]
fn copy_only_rerun_reproduces_output() {
    let dir = tempfile::tempdir().unwrap();
    write_frames(dir.path(), "video1", 4);
    let cfg = config(dir.path(), 0);
    let snapshot = |cfg: &AugmentConfig| {
        let augmenter = AugmentationPipeline::new(cfg.transforms.clone()).unwrap();
        DatasetAugmenter::new(cfg, &FsStorage, augmenter)
            .run(&mut StdRng::seed_from_u64(11))
            .unwrap();
        let mut contents = vec![];
        for split in Split::ALL.iter() {
            for sub in ["images", "labels"].iter() {
                let d = cfg.output_root.join(split.dir_name()).join(sub);
                for name in files_in(&d) {
                    contents.push((name.clone(), fs::read(d.join(&name)).unwrap()));
                }
            }
        }
        contents
    };
    let first = snapshot(&cfg);
    let second = snapshot(&cfg);
    assert_eq!(first.len(), 4 * 2);
    assert_eq!(first, second);
}

#[cfg(unix)]
#[test]
fn broken_subdirectory_does_not_abort_discovery() {
    let dir = tempfile::tempdir().unwrap();
    write_frames(dir.path(), "video1", 3);
    std::os::unix::fs::symlink(
        dir.path().join("does_not_exist"),
        dir.path().join("frames/video2"),
    )
    .unwrap();
    let cfg = config(dir.path(), 0);
    let augmenter = AugmentationPipeline::new(cfg.transforms.clone()).unwrap();
    let report = DatasetAugmenter::new(&cfg, &FsStorage, augmenter)
        .run(&mut StdRng::seed_from_u64(5))
        .unwrap();
    assert_eq!(report.pairs_found, 3);
    assert_eq!(report.total_processed(), 3);
}
