//! Frames, matrices and the metadata that travels with them.
//!
//! A [`Frame`] is one time step of `N` samples. A [`Matrix`] is a contiguous
//! run of frames stored frame-major: frame `i` occupies
//! `data[i * n .. (i + 1) * n]`. Both carry per-step [`TimeMeta`].
//!
//! The element layout of a level is described by a [`FieldLayout`]: an ordered
//! list of named fields, each `width` elements wide. Element names follow the
//! `name[i]` convention for array fields, so a 3-wide field `mfcc` with
//! `arr_offset = 1` exposes `mfcc[1]`, `mfcc[2]`, `mfcc[3]`.

/// Sample type stored in levels.
pub type Sample = f32;

/// Timing information for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TimeMeta {
    /// Absolute frame index in the level.
    pub vidx: i64,
    /// Frame period in seconds (0 for aperiodic levels).
    pub period: f64,
    /// Start time of the frame in seconds.
    pub time: f64,
    /// Length of the frame in seconds.
    pub length_sec: f64,
    /// Wall-clock stamp in seconds since the scheduler started (negative if unset).
    pub stamp: f64,
}

impl TimeMeta {
    /// Derives metadata for frame `vidx` of a level with the given period and frame size.
    pub fn derived(vidx: i64, period: f64, frame_size_sec: f64) -> Self {
        Self {
            vidx,
            period,
            time: vidx as f64 * period,
            length_sec: frame_size_sec,
            stamp: -1.0,
        }
    }
}

/// One named field of a frame layout.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMeta {
    /// Field name.
    pub name: String,
    /// Number of elements in the field.
    pub width: usize,
    /// Index of the first element when rendering array names (`name[arr_offset]`).
    pub arr_offset: usize,
}

impl FieldMeta {
    /// Creates a field.
    pub fn new(name: impl Into<String>, width: usize, arr_offset: usize) -> Self {
        Self {
            name: name.into(),
            width,
            arr_offset,
        }
    }
}

/// Ordered field layout of a level or of a concatenated reader.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldLayout {
    fields: Vec<FieldMeta>,
}

impl FieldLayout {
    /// Creates an empty layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field.
    pub fn push(&mut self, field: FieldMeta) {
        self.fields.push(field);
    }

    /// Appends all fields of another layout.
    pub fn extend(&mut self, other: &FieldLayout) {
        self.fields.extend(other.fields.iter().cloned());
    }

    /// Returns the fields in order.
    pub fn fields(&self) -> &[FieldMeta] {
        &self.fields
    }

    /// Number of fields.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Total element count (sum of field widths).
    pub fn width(&self) -> usize {
        self.fields.iter().map(|f| f.width).sum()
    }

    /// Returns `true` if no field has been declared.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Calls `f(field_index, element_offset, field)` for every field.
    ///
    /// This is the shared per-field iteration used by vector processors that
    /// need to walk a frame one field at a time.
    pub fn for_each_field(&self, mut f: impl FnMut(usize, usize, &FieldMeta)) {
        let mut offset = 0;
        for (i, field) in self.fields.iter().enumerate() {
            f(i, offset, field);
            offset += field.width;
        }
    }

    /// Name of element `idx`, or `None` if out of range.
    ///
    /// Single-element fields are named plainly; wider fields use `name[i]`.
    pub fn element_name(&self, idx: usize) -> Option<String> {
        let mut offset = 0;
        for field in &self.fields {
            if idx < offset + field.width {
                if field.width == 1 {
                    return Some(field.name.clone());
                }
                return Some(format!("{}[{}]", field.name, idx - offset + field.arr_offset));
            }
            offset += field.width;
        }
        None
    }

    /// Finds a field by name.
    ///
    /// Returns `(field_index, element_offset)`. A suffix like `name[3]` selects
    /// the element of that array index, so the returned offset points at it.
    pub fn find_field(&self, name: &str) -> Option<(usize, usize)> {
        let (base, arr_idx) = match name.rfind('[') {
            Some(open) if name.ends_with(']') => {
                let idx = name[open + 1..name.len() - 1].parse::<usize>().ok()?;
                (&name[..open], Some(idx))
            }
            _ => (name, None),
        };
        let mut offset = 0;
        for (i, field) in self.fields.iter().enumerate() {
            if field.name == base {
                return match arr_idx {
                    None => Some((i, offset)),
                    Some(a) if a >= field.arr_offset && a < field.arr_offset + field.width => {
                        Some((i, offset + a - field.arr_offset))
                    }
                    Some(_) => None,
                };
            }
            offset += field.width;
        }
        None
    }
}

/// A single time step.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    /// Sample values, `N` wide.
    pub data: Vec<Sample>,
    /// Timing metadata. `None` lets the level derive it from the write index.
    pub time: Option<TimeMeta>,
}

impl Frame {
    /// Creates a frame without explicit timing.
    pub fn new(data: Vec<Sample>) -> Self {
        Self { data, time: None }
    }

    /// Creates a zero-filled frame of width `n`.
    pub fn zeros(n: usize) -> Self {
        Self::new(vec![0.0; n])
    }

    /// Attaches timing metadata.
    pub fn with_time(mut self, time: TimeMeta) -> Self {
        self.time = Some(time);
        self
    }

    /// Frame width.
    pub fn width(&self) -> usize {
        self.data.len()
    }
}

/// A block of consecutive frames, stored frame-major.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Matrix {
    n: usize,
    data: Vec<Sample>,
    time: Vec<TimeMeta>,
}

impl Matrix {
    /// Creates a zero-filled matrix of `frames` frames, `n` wide.
    pub fn zeros(n: usize, frames: usize) -> Self {
        Self {
            n,
            data: vec![0.0; n * frames],
            time: vec![TimeMeta::default(); frames],
        }
    }

    /// Builds a matrix from frame-major data.
    ///
    /// Returns `None` if `n` is zero or `data.len()` is not a multiple of `n`.
    pub fn from_frames(n: usize, data: Vec<Sample>) -> Option<Self> {
        if n == 0 || data.len() % n != 0 {
            return None;
        }
        let frames = data.len() / n;
        Some(Self {
            n,
            data,
            time: vec![TimeMeta::default(); frames],
        })
    }

    /// Frame width.
    pub fn width(&self) -> usize {
        self.n
    }

    /// Number of frames.
    pub fn frames(&self) -> usize {
        self.time.len()
    }

    /// Returns `true` if the matrix holds no frames.
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Frame-major sample data.
    pub fn data(&self) -> &[Sample] {
        &self.data
    }

    /// Mutable frame-major sample data.
    pub fn data_mut(&mut self) -> &mut [Sample] {
        &mut self.data
    }

    /// Samples of frame `i`.
    pub fn frame(&self, i: usize) -> &[Sample] {
        &self.data[i * self.n..(i + 1) * self.n]
    }

    /// Mutable samples of frame `i`.
    pub fn frame_mut(&mut self, i: usize) -> &mut [Sample] {
        &mut self.data[i * self.n..(i + 1) * self.n]
    }

    /// Timing metadata per frame.
    pub fn time(&self) -> &[TimeMeta] {
        &self.time
    }

    /// Mutable timing metadata per frame.
    pub fn time_mut(&mut self) -> &mut [TimeMeta] {
        &mut self.time
    }

    /// Copies frame `i` out as a [`Frame`].
    pub fn to_frame(&self, i: usize) -> Frame {
        Frame::new(self.frame(i).to_vec()).with_time(self.time[i])
    }

    /// Reshapes in place to `n` x `frames`, reusing the allocation.
    pub(crate) fn reset(&mut self, n: usize, frames: usize) {
        self.n = n;
        self.data.clear();
        self.data.resize(n * frames, 0.0);
        self.time.clear();
        self.time.resize(frames, TimeMeta::default());
    }

    /// Drops trailing frames beyond `frames`.
    pub(crate) fn truncate(&mut self, frames: usize) {
        self.data.truncate(frames * self.n);
        self.time.truncate(frames);
    }
}

/// How a matrix read fills frames that lie before index 0 or past the end of input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Padding {
    /// Fill with zeros.
    #[default]
    Zero,
    /// Repeat the nearest real frame (first frame at the start, last at the end).
    Repeat,
    /// Leave the frames out; at the end this truncates the matrix.
    None,
}

impl Padding {
    /// Parses `"zero"`, `"repeat"`/`"first"` or `"none"`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "zero" => Some(Self::Zero),
            "repeat" | "first" => Some(Self::Repeat),
            "none" | "truncate" => Some(Self::None),
            _ => None,
        }
    }
}
