//! Fixed-rate frame pacing
//!
//! The compositor renders on a fixed cadence (60 Hz by default). The pacer
//! hands out the deadline of the next frame so the event loop can sleep with
//! `ControlFlow::WaitUntil` instead of spinning, and keeps a short history of
//! frame durations for the periodic stats line.
//!
//! All methods take the current time explicitly so the pacer can be driven
//! deterministically in tests.

use log::{debug, info, warn};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Number of frame durations kept for statistics
const FRAME_HISTORY_SIZE: usize = 120;

/// A frame that takes this many targets is reported as missed
const MISSED_FRAME_THRESHOLD: f32 = 1.5;

/// Summary of recent frame timing
#[derive(Debug, Clone, PartialEq)]
pub struct FrameStats {
    pub avg_frame_time: Duration,
    pub min_frame_time: Duration,
    pub max_frame_time: Duration,
    /// Effective rate derived from the start-to-start interval
    pub current_fps: f32,
    pub missed_frames: u64,
    pub total_frames: u64,
}

impl Default for FrameStats {
    fn default() -> Self {
        Self {
            avg_frame_time: Duration::ZERO,
            min_frame_time: Duration::MAX,
            max_frame_time: Duration::ZERO,
            current_fps: 0.0,
            missed_frames: 0,
            total_frames: 0,
        }
    }
}

pub struct FramePacer {
    target: Duration,
    frame_start: Option<Instant>,
    last_start: Option<Instant>,
    next_deadline: Option<Instant>,
    durations: VecDeque<Duration>,
    intervals: VecDeque<Duration>,
    stats: FrameStats,
    missed_warned: bool,
}

impl FramePacer {
    /// Pace at `target_fps` frames per second (clamped to at least 1)
    pub fn new(target_fps: u32) -> Self {
        let target = Duration::from_secs_f64(1.0 / target_fps.max(1) as f64);
        info!("🎬 Frame pacer: {} fps ({:?} per frame)", target_fps.max(1), target);
        Self {
            target,
            frame_start: None,
            last_start: None,
            next_deadline: None,
            durations: VecDeque::with_capacity(FRAME_HISTORY_SIZE),
            intervals: VecDeque::with_capacity(FRAME_HISTORY_SIZE),
            stats: FrameStats::default(),
            missed_warned: false,
        }
    }

    pub fn target_frame_time(&self) -> Duration {
        self.target
    }

    /// Whether the next frame is due
    pub fn should_render(&self, now: Instant) -> bool {
        self.next_deadline.map_or(true, |deadline| now >= deadline)
    }

    /// When the next frame should start, once a frame has been rendered
    pub fn next_deadline(&self) -> Option<Instant> {
        self.next_deadline
    }

    /// Time left until the next frame is due
    pub fn time_until_deadline(&self, now: Instant) -> Duration {
        self.next_deadline
            .map_or(Duration::ZERO, |deadline| deadline.saturating_duration_since(now))
    }

    pub fn begin_frame(&mut self, now: Instant) {
        if let Some(last) = self.last_start {
            push_bounded(&mut self.intervals, now.saturating_duration_since(last));
        }
        self.last_start = Some(now);
        self.frame_start = Some(now);
    }

    pub fn end_frame(&mut self, now: Instant) {
        let Some(start) = self.frame_start.take() else {
            warn!("end_frame called without begin_frame");
            return;
        };

        let duration = now.saturating_duration_since(start);
        push_bounded(&mut self.durations, duration);
        self.stats.total_frames += 1;

        if duration.as_secs_f32() > self.target.as_secs_f32() * MISSED_FRAME_THRESHOLD {
            self.stats.missed_frames += 1;
            if !self.missed_warned {
                warn!("⚠️ Frame took {:?} (target {:?})", duration, self.target);
                self.missed_warned = true;
            } else {
                debug!("Frame took {:?} (target {:?})", duration, self.target);
            }
        }

        // Schedule from the frame start so slow frames do not accumulate drift;
        // if we are already past it, render again right away.
        let deadline = start + self.target;
        self.next_deadline = Some(deadline.max(now));
        self.update_stats();
    }

    fn update_stats(&mut self) {
        if let (Some(min), Some(max)) = (self.durations.iter().min(), self.durations.iter().max()) {
            self.stats.min_frame_time = *min;
            self.stats.max_frame_time = *max;
        }
        let total: Duration = self.durations.iter().sum();
        self.stats.avg_frame_time = total / self.durations.len().max(1) as u32;

        let interval_total: Duration = self.intervals.iter().sum();
        if !self.intervals.is_empty() && !interval_total.is_zero() {
            let avg = interval_total.as_secs_f32() / self.intervals.len() as f32;
            self.stats.current_fps = 1.0 / avg;
        }
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    /// Summary line for periodic logging
    pub fn summary(&self) -> String {
        format!(
            "{} frames, {:.1} fps, avg {:.2} ms (min {:.2}, max {:.2}), {} missed",
            self.stats.total_frames,
            self.stats.current_fps,
            self.stats.avg_frame_time.as_secs_f64() * 1000.0,
            self.stats.min_frame_time.as_secs_f64() * 1000.0,
            self.stats.max_frame_time.as_secs_f64() * 1000.0,
            self.stats.missed_frames
        )
    }
}

impl Default for FramePacer {
    fn default() -> Self {
        Self::new(60)
    }
}

fn push_bounded(history: &mut VecDeque<Duration>, value: Duration) {
    history.push_back(value);
    if history.len() > FRAME_HISTORY_SIZE {
        history.pop_front();
    }
}
