mod common;

use std::{fs, path::PathBuf, sync::Arc};

use image::RgbImage;
use tempfile::tempdir;

use anonymizer_core::{
    AnonymizeError, CancelToken, FaceOracle, JobEvent, JobRequest, JobSummary, JobTarget,
    MediaCodec, NoProgress, ProcessingParameters, spawn_job,
};
use anonymizer_utils::save_rgb_image;

use common::{MemoryCodec, frame_with_square, red_square};

#[test]
fn selection_requires_path_and_parameters() {
    let dir = tempdir().unwrap();
    let params = Some(ProcessingParameters::default());

    assert!(matches!(
        JobRequest::from_selection(None, params.clone()),
        Err(AnonymizeError::Selection(_))
    ));
    assert!(matches!(
        JobRequest::from_selection(Some(dir.path().to_path_buf()), None),
        Err(AnonymizeError::Selection(_))
    ));
    assert!(matches!(
        JobRequest::from_selection(Some(dir.path().join("missing.png")), params.clone()),
        Err(AnonymizeError::Selection(_))
    ));

    let notes = dir.path().join("notes.txt");
    fs::write(&notes, "hi").unwrap();
    assert!(matches!(
        JobRequest::from_selection(Some(notes), params.clone()),
        Err(AnonymizeError::Selection(_))
    ));

    let request = JobRequest::from_selection(Some(dir.path().to_path_buf()), params).unwrap();
    assert_eq!(request.target(), &JobTarget::Directory(dir.path().to_path_buf()));
}

#[test]
fn spawned_batch_streams_progress_then_finishes() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("album");
    fs::create_dir_all(&root).unwrap();
    for name in ["one.png", "two.png"] {
        save_rgb_image(root.join(name), &frame_with_square(48, 48, 8, 8, 16)).unwrap();
    }
    let codec = MemoryCodec::default();
    codec.add_video(&root.join("clip.mp4"), vec![RgbImage::new(16, 16); 2], 2);

    let request = JobRequest::from_selection(
        Some(root.clone()),
        Some(ProcessingParameters::new(0.5, 0, 0.2, 4, vec![24]).unwrap()),
    )
    .unwrap()
    .with_parallel_tiles(true);
    let oracle: Arc<dyn FaceOracle> = Arc::new(red_square);
    let handle = spawn_job(request, oracle, Arc::new(codec.clone()));

    let mut globals = Vec::new();
    let mut locals = 0;
    let summary = handle
        .wait_with(|event| match event {
            JobEvent::Global { progress, .. } => globals.push(*progress),
            JobEvent::Local(_) => locals += 1,
            JobEvent::Finished(_) => unreachable!("finished is returned, not forwarded"),
        })
        .unwrap();

    let out_root = dir.path().canonicalize().unwrap().join("album_anonymized");
    assert_eq!(summary.destination(), out_root.as_path());
    assert!(out_root.join("one.png").exists());
    assert!(codec.video(&out_root.join("clip.mp4")).is_some());
    assert_eq!(globals.len(), 4);
    assert!(globals.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(globals.last(), Some(&1.0));
    assert!(locals >= 3);
}

#[test]
fn spawned_single_file_reports_destination() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("selfie.jpg");
    save_rgb_image(&source, &frame_with_square(60, 40, 20, 10, 20)).unwrap();

    let request =
        JobRequest::from_selection(Some(source), Some(ProcessingParameters::default())).unwrap();
    let handle = spawn_job(request, Arc::new(red_square), Arc::new(MemoryCodec::default()));

    let mut events = Vec::new();
    while let Ok(event) = handle.events().recv() {
        let done = matches!(event, JobEvent::Finished(_));
        events.push(event);
        if done {
            break;
        }
    }
    let Some(JobEvent::Finished(Ok(JobSummary::File(outcome)))) = events.pop() else {
        panic!("expected a finished single-file job");
    };
    assert_eq!(outcome.destination, dir.path().join("selfie_anonymized.jpg"));
    assert!(outcome.destination.exists());
    assert!(matches!(events.first(), Some(JobEvent::Global { progress, .. }) if *progress == 0.0));
    assert!(matches!(events.last(), Some(JobEvent::Global { progress, .. }) if *progress == 1.0));
}

#[test]
fn failures_are_reported_once_through_the_handle() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("broken.png");
    fs::write(&source, b"nope").unwrap();

    let request =
        JobRequest::from_selection(Some(source.clone()), Some(ProcessingParameters::default()))
            .unwrap();
    let err = spawn_job(request, Arc::new(red_square), Arc::new(MemoryCodec::default()))
        .wait()
        .unwrap_err();
    match err {
        AnonymizeError::MediaRead { path, .. } => assert_eq!(path, source),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn cancelled_request_never_touches_frames() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("long.mp4");
    let codec = MemoryCodec::default();
    codec.add_video(&source, vec![RgbImage::new(8, 8); 10], 10);

    let request =
        JobRequest::from_selection(Some(source), Some(ProcessingParameters::default())).unwrap();
    let cancel = CancelToken::new();
    cancel.cancel();
    let codec_ref: &dyn MediaCodec = &codec;
    let err = request
        .execute(&red_square, codec_ref, &cancel, &NoProgress)
        .unwrap_err();
    assert!(matches!(err, AnonymizeError::Cancelled));
    let written: PathBuf = dir.path().join("long_anonymized.mp4");
    assert!(codec.video(&written).is_none());
}
