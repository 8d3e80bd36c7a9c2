//! End-to-end pipelines driven through the scheduler.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use strata_core::{
    Component, Error, ExternalInput, ExternalOutput, FieldLayout, Frame, HasReader, HasWriter,
    LevelConfig, Matrix, Message, NoHang, PauseMode, Progress, PushError, ReaderHandle, Result,
    RunStatus, Scheduler, SchedulerConfig, SchedulerHandle, SetupContext, ThreadAssignment,
    TickContext, TickResult, Tickable, WriterHandle,
};

// --- test components ---

/// Writes `total` frames whose elements all equal the frame index.
struct Source {
    writer: WriterHandle,
    width: usize,
    total: u64,
    written: u64,
    period: f64,
    depth: usize,
    no_hang: NoHang,
    abort_at: Option<(u64, SchedulerHandle)>,
}

impl Source {
    fn new(level: &str, width: usize, total: u64) -> Self {
        Self {
            writer: WriterHandle::new("src", level),
            width,
            total,
            written: 0,
            period: 0.0,
            depth: 100,
            no_hang: NoHang::Block,
            abort_at: None,
        }
    }
}

impl Tickable for Source {
    fn tick(&mut self, ctx: &mut TickContext<'_>) -> Result<TickResult> {
        if self.written >= self.total {
            return Ok(TickResult::Inactive);
        }
        if !self.writer.check_write(ctx.store(), 1) {
            return Ok(TickResult::DestinationNoSpace);
        }
        let frame = Frame::new(vec![self.written as f32; self.width]);
        self.writer.set_next_frame(ctx.store(), &frame)?;
        self.written += 1;
        if let Some((at, handle)) = &self.abort_at
            && self.written == *at
        {
            handle.request_abort();
        }
        Ok(TickResult::Success)
    }
}

impl HasWriter for Source {
    fn writer(&self) -> &WriterHandle {
        &self.writer
    }
    fn writer_mut(&mut self) -> &mut WriterHandle {
        &mut self.writer
    }
    fn configure_writer(&mut self, config: &mut LevelConfig, _input: Option<&LevelConfig>) -> Result<()> {
        config.period = self.period;
        config.buffer_size = self.depth;
        config.no_hang = self.no_hang;
        Ok(())
    }
    fn setup_new_names(&mut self, _input: Option<&FieldLayout>) -> Result<()> {
        self.writer.add_field("value", self.width, 0)
    }
}

impl Component for Source {
    fn as_writer(&mut self) -> Option<&mut dyn HasWriter> {
        Some(self)
    }
}

#[derive(Default)]
struct SinkLog {
    frames: Vec<Vec<f32>>,
    times: Vec<f64>,
    /// Frames read when EOI was first observed.
    read_at_eoi: Option<usize>,
}

/// Reads frames (or `block`-frame windows) and records them.
struct Sink {
    reader: ReaderHandle,
    block: usize,
    log: Arc<Mutex<SinkLog>>,
}

impl Sink {
    fn new(name: &str, levels: &[&str], block: usize) -> (Self, Arc<Mutex<SinkLog>>) {
        let log = Arc::new(Mutex::new(SinkLog::default()));
        let sink = Self {
            reader: ReaderHandle::new(name, levels),
            block,
            log: Arc::clone(&log),
        };
        (sink, log)
    }
}

impl Tickable for Sink {
    fn tick(&mut self, ctx: &mut TickContext<'_>) -> Result<TickResult> {
        if ctx.is_eoi() {
            let mut log = self.log.lock();
            if log.read_at_eoi.is_none() {
                log.read_at_eoi = Some(log.frames.len());
            }
        }
        if self.block > 1 {
            let m = self.reader.get_next_matrix(ctx.store())?;
            let mut log = self.log.lock();
            for i in 0..m.frames() {
                log.frames.push(m.frame(i).to_vec());
                log.times.push(m.time()[i].time);
            }
        } else {
            let f = self.reader.get_next_frame(ctx.store())?;
            let mut log = self.log.lock();
            log.times.push(f.time.map(|t| t.time).unwrap_or(-1.0));
            log.frames.push(f.data);
        }
        Ok(TickResult::Success)
    }
}

impl HasReader for Sink {
    fn reader(&self) -> &ReaderHandle {
        &self.reader
    }
    fn reader_mut(&mut self) -> &mut ReaderHandle {
        &mut self.reader
    }
    fn configure_reader(&mut self, _input: &LevelConfig) -> Result<()> {
        if self.block > 1 {
            self.reader
                .setup_sequential_matrix_reading(self.block, self.block, 0);
        }
        Ok(())
    }
}

impl Component for Sink {
    fn as_reader(&mut self) -> Option<&mut dyn HasReader> {
        Some(self)
    }
}

/// `out = in * factor`, frame by frame.
struct Gain {
    reader: ReaderHandle,
    writer: WriterHandle,
    factor: f32,
}

impl Gain {
    fn new(name: &str, input: &str, output: &str, factor: f32) -> Self {
        Self {
            reader: ReaderHandle::new(name, &[input]),
            writer: WriterHandle::new(name, output),
            factor,
        }
    }
}

impl Tickable for Gain {
    fn tick(&mut self, ctx: &mut TickContext<'_>) -> Result<TickResult> {
        if !self.reader.is_next_frame_read_ok(ctx.store()) {
            return Ok(TickResult::SourceNotAvailable);
        }
        if !self.writer.check_write(ctx.store(), 1) {
            return Ok(TickResult::DestinationNoSpace);
        }
        let mut frame = self.reader.get_next_frame(ctx.store())?;
        for v in &mut frame.data {
            *v *= self.factor;
        }
        frame.time = None;
        self.writer.set_next_frame(ctx.store(), &frame)?;
        Ok(TickResult::Success)
    }
}

impl HasReader for Gain {
    fn reader(&self) -> &ReaderHandle {
        &self.reader
    }
    fn reader_mut(&mut self) -> &mut ReaderHandle {
        &mut self.reader
    }
}

impl HasWriter for Gain {
    fn writer(&self) -> &WriterHandle {
        &self.writer
    }
    fn writer_mut(&mut self) -> &mut WriterHandle {
        &mut self.writer
    }
    fn setup_new_names(&mut self, input: Option<&FieldLayout>) -> Result<()> {
        let Some(input) = input else {
            return Err(Error::component("gain", "no input layout"));
        };
        for f in input.fields() {
            self.writer.add_field(f.name.clone(), f.width, f.arr_offset)?;
        }
        Ok(())
    }
}

impl Component for Gain {
    fn as_reader(&mut self) -> Option<&mut dyn HasReader> {
        Some(self)
    }
    fn as_writer(&mut self) -> Option<&mut dyn HasWriter> {
        Some(self)
    }
}

fn values(log: &Arc<Mutex<SinkLog>>) -> Vec<f32> {
    log.lock().frames.iter().map(|f| f[0]).collect()
}

// --- scenarios ---

#[test]
fn scenario_single_reader_keeps_pace() {
    let mut sched = Scheduler::new(SchedulerConfig::default());
    let mut src = Source::new("L1", 4, 10);
    src.period = 0.01;
    src.depth = 5;
    let (sink, log) = Sink::new("sink", &["L1"], 1);
    sched.add_component("src", "source", Box::new(src), ThreadAssignment::Default).unwrap();
    sched.add_component("sink", "sink", Box::new(sink), ThreadAssignment::Default).unwrap();
    sched.setup().unwrap();
    let report = sched.run().unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.eoi_count, 1);
    let log = log.lock();
    assert_eq!(log.frames.len(), 10);
    for (i, frame) in log.frames.iter().enumerate() {
        assert_eq!(frame, &vec![i as f32; 4]);
        assert!((log.times[i] - i as f64 * 0.01).abs() < 1e-9, "time of frame {i}: {}", log.times[i]);
    }
    let src = report.profile("src").unwrap();
    assert_eq!(src.count(TickResult::DestinationNoSpace), 0);
}

#[test]
fn scenario_writer_without_readers_discards() {
    let mut sched = Scheduler::new(SchedulerConfig::default());
    let mut src = Source::new("L1", 1, 100);
    src.depth = 5;
    src.no_hang = NoHang::DiscardWithoutReaders;
    sched.add_component("src", "source", Box::new(src), ThreadAssignment::Default).unwrap();
    sched.setup().unwrap();
    let report = sched.run().unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    let level = report.level("L1").unwrap();
    assert_eq!(level.cur_w, 100);
    assert_eq!(level.readers, 0);
    let src = report.profile("src").unwrap();
    assert_eq!(src.count(TickResult::DestinationNoSpace), 0);
    assert!(src.count(TickResult::Success) >= 100);
}

#[test]
fn scenario_eoi_waits_for_slowest_reader() {
    let mut sched = Scheduler::new(SchedulerConfig::default());
    let mut src = Source::new("L1", 1, 10);
    src.depth = 5;
    let (fast, fast_log) = Sink::new("fast", &["L1"], 1);
    let (slow, slow_log) = Sink::new("slow", &["L1"], 4);
    sched.add_component("src", "source", Box::new(src), ThreadAssignment::Default).unwrap();
    sched.add_component("fast", "sink", Box::new(fast), ThreadAssignment::Default).unwrap();
    sched.add_component("slow", "sink", Box::new(slow), ThreadAssignment::Default).unwrap();
    sched.setup().unwrap();
    let report = sched.run().unwrap();

    assert_eq!(report.eoi_count, 1);
    let expected: Vec<f32> = (0..10).map(|v| v as f32).collect();
    assert_eq!(values(&fast_log), expected);
    assert_eq!(fast_log.lock().read_at_eoi, Some(10));

    // Two full windows before EOI, then the tail padded with zeros.
    assert_eq!(slow_log.lock().read_at_eoi, Some(8));
    let slow = values(&slow_log);
    assert_eq!(&slow[..10], expected.as_slice());
    assert_eq!(&slow[10..], &[0.0, 0.0]);
}

#[test]
fn scenario_abort_mid_run() {
    let mut sched = Scheduler::new(SchedulerConfig::default().with_threads(2));
    let mut src = Source::new("L1", 8, u64::MAX);
    src.abort_at = Some((50, sched.handle()));
    let (sink, log) = Sink::new("sink", &["L1"], 1);
    sched.add_component("src", "source", Box::new(src), ThreadAssignment::Group(0)).unwrap();
    sched.add_component("sink", "sink", Box::new(sink), ThreadAssignment::Group(1)).unwrap();
    sched.setup().unwrap();
    let report = sched.run().unwrap();

    assert_eq!(report.status, RunStatus::Aborted);
    assert_eq!(report.eoi_count, 0);
    assert_eq!(report.level("L1").unwrap().cur_w, 50);
    let log = log.lock();
    assert!(log.frames.len() <= 50);
    for (i, frame) in log.frames.iter().enumerate() {
        assert!(frame.iter().all(|v| *v == i as f32), "torn frame {i}: {frame:?}");
    }
}

// --- threading ---

fn chain(config: SchedulerConfig, frames: u64) -> Vec<f32> {
    let mut sched = Scheduler::new(config);
    let (sink, log) = Sink::new("sink", &["c"], 1);
    // Declared downstream first.
    sched.add_component("sink", "sink", Box::new(sink), ThreadAssignment::Group(3)).unwrap();
    sched
        .add_component("g2", "gain", Box::new(Gain::new("g2", "b", "c", 3.0)), ThreadAssignment::Group(2))
        .unwrap();
    sched
        .add_component("g1", "gain", Box::new(Gain::new("g1", "a", "b", 2.0)), ThreadAssignment::Group(1))
        .unwrap();
    let mut src = Source::new("a", 2, frames);
    src.depth = 7;
    sched.add_component("src", "source", Box::new(src), ThreadAssignment::Default).unwrap();
    sched.setup().unwrap();
    let report = sched.run().unwrap();
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.eoi_count, 1);
    values(&log)
}

#[test]
fn threaded_runs_match_single_threaded() {
    let reference = chain(SchedulerConfig::default(), 300);
    let expected: Vec<f32> = (0..300).map(|v| v as f32 * 6.0).collect();
    assert_eq!(reference, expected);
    assert_eq!(chain(SchedulerConfig::default().with_threads(2), 300), reference);
    assert_eq!(chain(SchedulerConfig::default().with_threads(4), 300), reference);
    assert_eq!(chain(SchedulerConfig::default().with_threads(0), 300), reference);
}

#[test]
fn never_assigned_instance_is_not_ticked() {
    let mut sched = Scheduler::new(SchedulerConfig::default().with_threads(2));
    let (sink, log) = Sink::new("sink", &["L1"], 1);
    sched.add_component("src", "source", Box::new(Source::new("L1", 1, 5)), ThreadAssignment::Default).unwrap();
    sched.add_component("sink", "sink", Box::new(sink), ThreadAssignment::Never).unwrap();
    sched.setup().unwrap();
    let report = sched.run().unwrap();
    assert_eq!(report.profile("sink").unwrap().ticks, 0);
    assert!(log.lock().frames.is_empty());
    assert_eq!(report.level("L1").unwrap().cur_w, 5);
}

// --- setup ---

#[test]
fn unresolved_read_request_does_not_converge() {
    let mut sched = Scheduler::new(SchedulerConfig::default());
    let (sink, _) = Sink::new("sink", &["missing"], 1);
    sched.add_component("sink", "sink", Box::new(sink), ThreadAssignment::Default).unwrap();
    sched.add_component("src", "source", Box::new(Source::new("L1", 1, 5)), ThreadAssignment::Default).unwrap();
    let err = sched.setup().unwrap_err();
    match err {
        Error::NotConverged { phase, passes, pending } => {
            assert_eq!(phase, "configure");
            assert_eq!(passes, 4);
            assert_eq!(pending.len(), 1);
            assert_eq!(pending[0].0, "sink");
            assert!(pending[0].1.contains("missing"), "got: {}", pending[0].1);
        }
        other => panic!("expected NotConverged, got: {other}"),
    }
}

#[test]
fn pass_cap_is_configurable() {
    let mut sched = Scheduler::new(SchedulerConfig::default().with_max_passes(1));
    let (sink, _) = Sink::new("sink", &["L1"], 1);
    sched.add_component("sink", "sink", Box::new(sink), ThreadAssignment::Default).unwrap();
    sched.add_component("src", "source", Box::new(Source::new("L1", 1, 5)), ThreadAssignment::Default).unwrap();
    let err = sched.setup().unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("sink"), "got: {msg}");
}

#[test]
fn two_writers_on_one_level_rejected() {
    let mut sched = Scheduler::new(SchedulerConfig::default());
    sched.add_component("a", "source", Box::new(Source::new("L1", 1, 5)), ThreadAssignment::Default).unwrap();
    let mut second = Source::new("L1", 1, 5);
    second.writer = WriterHandle::new("b", "L1");
    sched.add_component("b", "source", Box::new(second), ThreadAssignment::Default).unwrap();
    assert!(matches!(sched.setup(), Err(Error::DuplicateWriter { .. })));
}

// --- errors ---

struct Failing {
    after: u32,
}

impl Tickable for Failing {
    fn tick(&mut self, _ctx: &mut TickContext<'_>) -> Result<TickResult> {
        if self.after == 0 {
            return Err(Error::component("failing", "boom"));
        }
        self.after -= 1;
        Ok(TickResult::Success)
    }
}

impl Component for Failing {}

#[test]
fn logic_error_aborts_the_run() {
    for threads in [1, 2] {
        let mut sched = Scheduler::new(SchedulerConfig::default().with_threads(threads));
        sched
            .add_component("f", "failing", Box::new(Failing { after: 3 }), ThreadAssignment::Group(1))
            .unwrap();
        sched.add_component("src", "source", Box::new(Source::new("L1", 1, 100)), ThreadAssignment::Default).unwrap();
        sched.setup().unwrap();
        let err = sched.run().unwrap_err();
        assert!(matches!(err, Error::Component { ref message, .. } if message == "boom"));
    }
}

// --- pause ---

/// Requests a pause on its `at`-th tick and counts notifications.
struct Pauser {
    handle: SchedulerHandle,
    mode: PauseMode,
    at: u32,
    ticks: u32,
    accept: bool,
    paused: Arc<AtomicUsize>,
    resumed: Arc<AtomicUsize>,
}

impl Tickable for Pauser {
    fn tick(&mut self, _ctx: &mut TickContext<'_>) -> Result<TickResult> {
        self.ticks += 1;
        if self.ticks == self.at {
            self.handle.pause(self.mode);
        }
        Ok(TickResult::Inactive)
    }
    fn pause_event(&mut self) -> bool {
        self.paused.fetch_add(1, Ordering::SeqCst);
        self.accept
    }
    fn resume_event(&mut self) {
        self.resumed.fetch_add(1, Ordering::SeqCst);
    }
}

impl Component for Pauser {}

/// Runs a 20-frame pipeline with a pauser. The resumer waits for the pause
/// notification and for `drained` frames at the sink before resuming.
fn pause_run(
    mode: PauseMode,
    accept: bool,
    resume_after: Option<Duration>,
    drained: usize,
) -> (usize, usize, Vec<f32>) {
    let mut sched = Scheduler::new(SchedulerConfig::default());
    let handle = sched.handle();
    let paused = Arc::new(AtomicUsize::new(0));
    let resumed = Arc::new(AtomicUsize::new(0));
    let pauser = Pauser {
        handle: handle.clone(),
        mode,
        at: 3,
        ticks: 0,
        accept,
        paused: Arc::clone(&paused),
        resumed: Arc::clone(&resumed),
    };
    let (sink, log) = Sink::new("sink", &["L1"], 1);
    sched.add_component("pauser", "pauser", Box::new(pauser), ThreadAssignment::Default).unwrap();
    sched.add_component("src", "source", Box::new(Source::new("L1", 1, 20)), ThreadAssignment::Default).unwrap();
    sched.add_component("sink", "sink", Box::new(sink), ThreadAssignment::Default).unwrap();
    sched.setup().unwrap();

    let resumer = resume_after.map(|delay| {
        let paused = Arc::clone(&paused);
        let log = Arc::clone(&log);
        thread::spawn(move || {
            while paused.load(Ordering::SeqCst) == 0 || log.lock().frames.len() < drained {
                thread::sleep(Duration::from_millis(1));
            }
            thread::sleep(delay);
            handle.resume();
        })
    });
    let report = sched.run().unwrap();
    if let Some(t) = resumer {
        t.join().unwrap();
    }
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.eoi_count, 1);
    (
        paused.load(Ordering::SeqCst),
        resumed.load(Ordering::SeqCst),
        values(&log),
    )
}

#[test]
fn immediate_pause_sleeps_until_resume() {
    let (paused, resumed, seen) = pause_run(PauseMode::Immediate, true, Some(Duration::from_millis(20)), 0);
    assert_eq!(paused, 1);
    assert_eq!(resumed, 1);
    assert_eq!(seen.len(), 20);
}

#[test]
fn rejected_pause_resumes_at_once() {
    let (paused, resumed, seen) = pause_run(PauseMode::Immediate, false, None, 0);
    assert_eq!(paused, 1);
    assert_eq!(resumed, 1);
    assert_eq!(seen.len(), 20);
}

#[test]
fn drain_pause_suspends_when_quiescent() {
    let (paused, resumed, seen) = pause_run(
        PauseMode::DrainThenSuspend { timeout: 10_000 },
        true,
        Some(Duration::from_millis(20)),
        20,
    );
    assert_eq!(paused, 1);
    assert_eq!(resumed, 1);
    let expected: Vec<f32> = (0..20).map(|v| v as f32).collect();
    assert_eq!(seen, expected);
}

#[test]
fn abort_wakes_a_paused_loop() {
    let mut sched = Scheduler::new(SchedulerConfig::default());
    let handle = sched.handle();
    let paused = Arc::new(AtomicUsize::new(0));
    let pauser = Pauser {
        handle: handle.clone(),
        mode: PauseMode::Immediate,
        at: 1,
        ticks: 0,
        accept: true,
        paused: Arc::clone(&paused),
        resumed: Arc::default(),
    };
    sched.add_component("pauser", "pauser", Box::new(pauser), ThreadAssignment::Default).unwrap();
    sched.setup().unwrap();
    let aborter = thread::spawn(move || {
        while paused.load(Ordering::SeqCst) == 0 {
            thread::sleep(Duration::from_millis(1));
        }
        handle.request_abort();
    });
    let report = sched.run().unwrap();
    aborter.join().unwrap();
    assert_eq!(report.status, RunStatus::Aborted);
}

// --- external data ---

/// Drains an external queue into its level.
struct Feed {
    writer: WriterHandle,
    width: usize,
    input: Option<ExternalInput>,
}

impl Tickable for Feed {
    fn tick(&mut self, ctx: &mut TickContext<'_>) -> Result<TickResult> {
        let Some(input) = &self.input else {
            return Ok(TickResult::Inactive);
        };
        let room = self.writer.n_free(ctx.store());
        if room == 0 {
            return Ok(TickResult::DestinationNoSpace);
        }
        match input.pop(room.min(4)) {
            Some(block) => {
                self.writer.set_next_matrix(ctx.store(), &block)?;
                Ok(TickResult::Success)
            }
            None if input.is_drained() => {
                self.writer.set_eoi(ctx.store(), true)?;
                Ok(TickResult::Inactive)
            }
            None => Ok(TickResult::ExtSourceNotAvailable),
        }
    }
}

impl HasWriter for Feed {
    fn writer(&self) -> &WriterHandle {
        &self.writer
    }
    fn writer_mut(&mut self) -> &mut WriterHandle {
        &mut self.writer
    }
    fn setup_new_names(&mut self, _input: Option<&FieldLayout>) -> Result<()> {
        self.writer.add_field("x", self.width, 0)
    }
}

impl Component for Feed {
    fn as_writer(&mut self) -> Option<&mut dyn HasWriter> {
        Some(self)
    }
    fn on_register(&mut self, ctx: &SetupContext<'_>) -> Result<Progress> {
        self.input = Some(ctx.external.create_input(self.writer.level_name(), self.width, 8));
        Ok(Progress::Ready)
    }
}

/// Delivers every frame of its input to the external output callbacks.
struct Tap {
    reader: ReaderHandle,
    output: Option<ExternalOutput>,
}

impl Tickable for Tap {
    fn tick(&mut self, ctx: &mut TickContext<'_>) -> Result<TickResult> {
        let frame = self.reader.get_next_frame(ctx.store())?;
        if let Some(out) = &self.output
            && let Some(block) = Matrix::from_frames(frame.data.len(), frame.data)
        {
            out.deliver(&block);
        }
        Ok(TickResult::Success)
    }
}

impl HasReader for Tap {
    fn reader(&self) -> &ReaderHandle {
        &self.reader
    }
    fn reader_mut(&mut self) -> &mut ReaderHandle {
        &mut self.reader
    }
}

impl Component for Tap {
    fn as_reader(&mut self) -> Option<&mut dyn HasReader> {
        Some(self)
    }
    fn on_register(&mut self, ctx: &SetupContext<'_>) -> Result<Progress> {
        self.output = Some(ctx.external.output("ext"));
        Ok(Progress::Ready)
    }
}

#[test]
fn external_feed_drains_and_completes() {
    let mut sched = Scheduler::new(SchedulerConfig::default().with_threads(2));
    let feed = Feed {
        writer: WriterHandle::new("feed", "ext"),
        width: 2,
        input: None,
    };
    let tap = Tap {
        reader: ReaderHandle::new("tap", &["ext"]),
        output: None,
    };
    sched.add_component("feed", "feed", Box::new(feed), ThreadAssignment::Group(0)).unwrap();
    sched.add_component("tap", "tap", Box::new(tap), ThreadAssignment::Group(1)).unwrap();
    sched.setup().unwrap();

    let handle = sched.handle();
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    handle
        .external_output("ext")
        .on_data(move |m| sink.lock().extend_from_slice(m.data()));

    let input = handle.external_input("ext").unwrap();
    assert_eq!(input.width(), 2);
    assert!(matches!(
        input.push(&[0.0; 18]),
        Err(PushError::BufferFull { capacity: 8, .. })
    ));
    let producer = thread::spawn(move || {
        for i in 0..30 {
            let frame = [i as f32, -(i as f32)];
            while let Err(PushError::BufferFull { .. }) = input.push(&frame) {
                thread::sleep(Duration::from_millis(1));
            }
        }
        assert!(input.end_of_input());
    });
    let report = sched.run().unwrap();
    producer.join().unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    let got = received.lock();
    assert_eq!(got.len(), 60);
    for i in 0..30 {
        assert_eq!(got[2 * i], i as f32);
        assert_eq!(got[2 * i + 1], -(i as f32));
    }
}

// --- messages ---

/// Sends a numbered message to `to` on each of its first `count` ticks.
struct Talker {
    to: &'static str,
    count: i64,
    sent: i64,
}

impl Tickable for Talker {
    fn tick(&mut self, ctx: &mut TickContext<'_>) -> Result<TickResult> {
        if self.sent >= self.count {
            return Ok(TickResult::Inactive);
        }
        ctx.send_message(self.to, Message::new("talk").with_int(0, self.sent));
        self.sent += 1;
        Ok(TickResult::Success)
    }
}

impl Component for Talker {}

struct Listener {
    got: Arc<Mutex<Vec<(String, i64)>>>,
}

impl Tickable for Listener {
    fn tick(&mut self, _ctx: &mut TickContext<'_>) -> Result<TickResult> {
        Ok(TickResult::Inactive)
    }
    fn handle_message(&mut self, msg: &Message) -> bool {
        self.got.lock().push((msg.sender.clone(), msg.ints[0]));
        true
    }
}

impl Component for Listener {}

#[test]
fn messages_are_delivered_in_order() {
    let mut sched = Scheduler::new(SchedulerConfig::default());
    let a = Arc::new(Mutex::new(Vec::new()));
    let b = Arc::new(Mutex::new(Vec::new()));
    sched
        .add_component("talker", "talker", Box::new(Talker { to: "a, b", count: 5, sent: 0 }), ThreadAssignment::Default)
        .unwrap();
    sched.add_component("a", "listener", Box::new(Listener { got: Arc::clone(&a) }), ThreadAssignment::Default).unwrap();
    sched.add_component("b", "listener", Box::new(Listener { got: Arc::clone(&b) }), ThreadAssignment::Default).unwrap();
    sched.setup().unwrap();
    assert_eq!(sched.handle().send_message("a", Message::new("hello").with_int(0, -1)), 1);
    sched.run().unwrap();

    let expected_b: Vec<(String, i64)> = (0..5).map(|i| ("talker".to_string(), i)).collect();
    let mut expected_a = vec![("host".to_string(), -1)];
    expected_a.extend(expected_b.iter().cloned());
    assert_eq!(*a.lock(), expected_a);
    assert_eq!(*b.lock(), expected_b);
}
