//! Runtime wiring: the predictor timer and the measurement consumer share
//! one pipeline behind a single exclusive lock.
//!
//! Each pass holds the lock for its whole duration, so a predict never
//! interleaves with a measurement cycle. Transform lookup runs before the
//! lock is taken.

use crate::{
    config::LocalizerConfig,
    error::{Result, TrackerError},
    pipeline::{Pipeline, PipelineConfig, PipelineOutput},
    preprocess::{MeasurementPreprocessor, TransformSource},
    types::{DetectionBatch, Estimate},
};
use parking_lot::Mutex;
use sensor_models::{DetectionCovariance, PinholeIntrinsics};
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tracing::{debug, info, warn};

pub type SharedPipeline = Arc<Mutex<Pipeline>>;

/// Where published estimates go.
pub type EstimateSink = mpsc::Sender<Estimate>;

/// Advance every track on a fixed-rate timer until `shutdown` flips to true
/// (or its sender is dropped).
///
/// `dt` is the measured time since the previous tick ran, not the nominal
/// period. Late ticks are skipped rather than replayed in a burst. A zero
/// `period` is refused.
pub async fn run_predictor(
    pipeline: SharedPipeline,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    if period.is_zero() {
        return Err(TrackerError::InvalidConfiguration(
            "predict period must be positive".into(),
        ));
    }
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // First tick completes immediately
    interval.tick().await;
    let mut last = Instant::now();

    loop {
        tokio::select! {
            // The yielded instant is the scheduled deadline, not the firing time
            _ = interval.tick() => {
                let now = Instant::now();
                let dt = now.saturating_duration_since(last).as_secs_f64();
                last = now;
                let mut p = pipeline.lock();
                match p.predict_all(dt) {
                    Ok(0) => {}
                    Ok(dropped) => warn!(dropped, "tracks dropped after degenerate prediction"),
                    Err(err) => warn!(%err, "predict pass skipped"),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    debug!("predictor stopped");
    Ok(())
}

/// Handles returned by [`LocalizerService::spawn`].
pub struct ServiceHandles {
    pub predictor: JoinHandle<Result<()>>,
    pub measurements: JoinHandle<()>,
}

impl ServiceHandles {
    pub async fn join(self) {
        match self.predictor.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(%err, "predictor refused to run"),
            Err(err) => warn!(%err, "predictor task failed"),
        }
        if let Err(err) = self.measurements.await {
            warn!(%err, "measurement task failed");
        }
    }
}

/// The localizer node: preprocessing, the shared pipeline and the transform
/// source it reads sensor poses from.
pub struct LocalizerService<T: TransformSource> {
    pipeline: SharedPipeline,
    preprocessor: MeasurementPreprocessor,
    transforms: Arc<T>,
    predict_period: Duration,
}

impl<T: TransformSource + 'static> LocalizerService<T> {
    pub fn new(config: &LocalizerConfig, intrinsics: PinholeIntrinsics, transforms: Arc<T>) -> Result<Self> {
        config.validate()?;
        let pipeline = Pipeline::new(PipelineConfig::from(config))?;
        let preprocessor = MeasurementPreprocessor::new(
            intrinsics,
            DetectionCovariance::new(config.xy_covariance_coeff, config.z_covariance_coeff),
            config.world_frame.clone(),
            config.transform_timeout,
        );
        Ok(Self {
            pipeline: Arc::new(Mutex::new(pipeline)),
            preprocessor,
            transforms,
            predict_period: config.predict_period,
        })
    }

    pub fn pipeline(&self) -> SharedPipeline {
        Arc::clone(&self.pipeline)
    }

    /// Run one measurement cycle for a detection batch.
    ///
    /// A failed transform lookup returns the error with the bank untouched.
    pub fn handle_detections(&self, batch: &DetectionBatch) -> Result<PipelineOutput> {
        let measurements = self.preprocessor.preprocess(batch, self.transforms.as_ref())?;
        let mut p = self.pipeline.lock();
        Ok(p.process_measurements(&measurements))
    }

    /// Start the predictor and the measurement consumer. Both stop when
    /// `shutdown` flips to true; the consumer also stops when `detections`
    /// closes or the estimate receiver is dropped.
    ///
    /// Each batch is handled on the blocking pool, since the transform
    /// lookup may wait up to its timeout.
    pub fn spawn(
        self,
        mut detections: mpsc::Receiver<DetectionBatch>,
        estimates: EstimateSink,
        shutdown: watch::Receiver<bool>,
    ) -> ServiceHandles {
        let predictor = tokio::spawn(run_predictor(self.pipeline(), self.predict_period, shutdown.clone()));
        info!(period_ms = self.predict_period.as_millis() as u64, "localizer started");

        let service = Arc::new(self);
        let mut shutdown = shutdown;
        let measurements = tokio::spawn(async move {
            loop {
                let batch = tokio::select! {
                    batch = detections.recv() => match batch {
                        Some(batch) => batch,
                        None => break,
                    },
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                        continue;
                    }
                };
                let frame = batch.frame_id.clone();
                let svc = Arc::clone(&service);
                let output = match tokio::task::spawn_blocking(move || svc.handle_detections(&batch)).await {
                    Ok(Ok(output)) => output,
                    Ok(Err(err)) => {
                        warn!(%frame, %err, "detection batch dropped");
                        continue;
                    }
                    Err(err) => {
                        warn!(%frame, %err, "measurement cycle failed");
                        continue;
                    }
                };
                if let Some(estimate) = output.estimate {
                    if estimates.send(estimate).await.is_err() {
                        debug!("estimate receiver closed");
                        break;
                    }
                }
            }
            debug!("measurement consumer stopped");
        });

        ServiceHandles { predictor, measurements }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        kf::CvKfConfig,
        preprocess::StaticTransformSource,
        types::{Measurement, MeasurementBatch, PosCov, PosVec},
    };
    use approx::assert_abs_diff_eq;
    use nalgebra::Vector3;
    use sensor_models::{Detection, RegionOfInterest, RigidTransform};

    fn detection_batch(frame: &str, t: f64) -> DetectionBatch {
        DetectionBatch {
            frame_id: frame.to_owned(),
            timestamp: t,
            detections: vec![Detection {
                x: 0.5,
                y: 0.5,
                depth: 2.0,
                roi: RegionOfInterest::full_frame(640, 480),
            }],
        }
    }

    fn service() -> LocalizerService<StaticTransformSource> {
        let config = LocalizerConfig::default();
        let transforms = StaticTransformSource::new().with(
            &config.world_frame,
            "camera",
            sensor_models::RigidTransform::identity(),
        );
        LocalizerService::new(&config, PinholeIntrinsics::default(), Arc::new(transforms)).unwrap()
    }

    #[test]
    fn unavailable_transform_leaves_bank_untouched() {
        let svc = service();
        svc.handle_detections(&detection_batch("camera", 0.0)).unwrap();
        let before = svc.pipeline().lock().bank().iter().map(|t| t.state).collect::<Vec<_>>();
        let err = svc.handle_detections(&detection_batch("unknown_camera", 0.1));
        assert!(matches!(err, Err(TrackerError::TransformUnavailable { .. })));
        let p = svc.pipeline();
        let p = p.lock();
        assert_eq!(p.cycles(), 1);
        assert_eq!(p.bank().iter().map(|t| t.state).collect::<Vec<_>>(), before);
    }

    #[test]
    fn second_batch_publishes_estimate() {
        let svc = service();
        assert!(svc.handle_detections(&detection_batch("camera", 0.0)).unwrap().estimate.is_none());
        let out = svc.handle_detections(&detection_batch("camera", 0.1)).unwrap();
        let est = out.estimate.unwrap();
        assert_eq!(est.frame_id, LocalizerConfig::default().world_frame);
        assert!((est.position[2] - 2.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn predictor_grows_uncertainty_until_shutdown() {
        let svc = service();
        svc.handle_detections(&detection_batch("camera", 0.0)).unwrap();
        let shared = svc.pipeline();
        let before = shared.lock().bank().iter().next().unwrap().uncertainty();

        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(run_predictor(shared.clone(), Duration::from_millis(50), rx));
        tokio::time::sleep(Duration::from_millis(120)).await;
        tx.send(true).unwrap();
        task.await.unwrap().unwrap();

        let after = shared.lock().bank().iter().next().map(|t| t.uncertainty());
        assert!(after.map_or(true, |u| u > before));
    }

    #[tokio::test]
    async fn spawned_service_forwards_estimates() {
        let svc = service();
        let (det_tx, det_rx) = mpsc::channel(8);
        let (est_tx, mut est_rx) = mpsc::channel(8);
        let (stop_tx, stop_rx) = watch::channel(false);
        let handles = svc.spawn(det_rx, est_tx, stop_rx);

        det_tx.send(detection_batch("camera", 0.0)).await.unwrap();
        det_tx.send(detection_batch("camera", 0.05)).await.unwrap();
        let est = est_rx.recv().await.unwrap();
        assert_eq!(est.timestamp, 0.05);

        stop_tx.send(true).unwrap();
        handles.join().await;
    }

    /// Let every ready task run without letting paused time auto-advance.
    async fn settle() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn zero_period_is_refused() {
        let svc = service();
        let (_tx, rx) = watch::channel(false);
        let res = run_predictor(svc.pipeline(), Duration::ZERO, rx).await;
        assert!(matches!(res, Err(TrackerError::InvalidConfiguration(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn late_tick_runs_once_with_measured_elapsed_time() {
        let pipeline = Pipeline::new(PipelineConfig {
            kf_config: CvKfConfig { process_noise: 0.0 },
            ..Default::default()
        })
        .unwrap();
        let shared: SharedPipeline = Arc::new(Mutex::new(pipeline));
        let cov = PosCov::from_diagonal(&Vector3::new(0.1, 0.1, 0.1));
        shared.lock().process_measurements(&MeasurementBatch::new(
            0.0,
            vec![Measurement::new(PosVec::new(1.0, 0.0, 0.0), cov, 0.0)],
        ));

        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(run_predictor(shared.clone(), Duration::from_millis(100), rx));
        settle().await;
        assert_eq!(shared.lock().predict_passes(), 0);

        // Three and a half periods pass before the predictor gets to run
        tokio::time::advance(Duration::from_millis(350)).await;
        settle().await;
        {
            let p = shared.lock();
            assert_eq!(p.predict_passes(), 1);
            // Without process noise P_xx = P0 + dt²·P_vv, P_vv = 1
            let var = p.bank().iter().next().unwrap().position_cov()[(0, 0)];
            assert_abs_diff_eq!(var, 0.1 + 0.35 * 0.35, epsilon = 1e-9);
        }

        tx.send(true).unwrap();
        task.await.unwrap().unwrap();
    }

    struct SlowTransforms;

    impl TransformSource for SlowTransforms {
        fn lookup_transform(&self, _: &str, _: &str, _: f64, timeout: Duration) -> Result<RigidTransform> {
            std::thread::sleep(timeout);
            Ok(RigidTransform::identity())
        }
    }

    #[tokio::test]
    async fn slow_transform_lookup_does_not_stall_the_runtime() {
        let config = LocalizerConfig {
            transform_timeout: Duration::from_millis(300),
            ..Default::default()
        };
        let svc = LocalizerService::new(&config, PinholeIntrinsics::default(), Arc::new(SlowTransforms)).unwrap();
        let (det_tx, det_rx) = mpsc::channel(8);
        let (est_tx, _est_rx) = mpsc::channel(8);
        let (stop_tx, stop_rx) = watch::channel(false);
        let handles = svc.spawn(det_rx, est_tx, stop_rx);

        det_tx.send(detection_batch("camera", 0.0)).await.unwrap();
        let start = std::time::Instant::now();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(start.elapsed() < Duration::from_millis(250));

        stop_tx.send(true).unwrap();
        handles.join().await;
    }
}
