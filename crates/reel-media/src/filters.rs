//! FFmpeg filter graph construction for reel assembly.
//!
//! Pure string builders; nothing here touches the filesystem.

/// Title overlay duration in seconds.
pub const TITLE_SECONDS: f64 = 5.0;
/// Title font size in pixels.
pub const TITLE_FONT_SIZE: u32 = 80;
/// Video/audio length mismatch tolerated before retiming.
pub const RETIME_TOLERANCE_SECS: f64 = 0.1;

/// Output frame size: 16:9 at the target width, both dimensions even.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputGeometry {
    pub width: u32,
    pub height: u32,
}

impl OutputGeometry {
    pub fn widescreen(target_width: u32) -> Self {
        let width = even(target_width.max(2));
        let height = even((width * 9 / 16).max(2));
        Self { width, height }
    }
}

fn even(v: u32) -> u32 {
    v - v % 2
}

/// Letterbox one input into the output frame at a fixed frame rate.
pub fn letterbox_chain(input: usize, geometry: OutputGeometry, fps: u32, label: &str) -> String {
    let OutputGeometry { width: w, height: h } = geometry;
    format!(
        "[{input}:v]scale={w}:{h}:force_original_aspect_ratio=decrease,\
         pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1,fps={fps},format=yuv420p,\
         setpts=PTS-STARTPTS,settb=AVTB[{label}]"
    )
}

/// Crossfade length actually applied: never more than half the shortest clip.
pub fn effective_transition(transition: f64, durations: &[f64]) -> f64 {
    if durations.len() < 2 || !(transition > 0.0) {
        return 0.0;
    }
    let shortest = durations.iter().copied().fold(f64::INFINITY, f64::min);
    transition.min(shortest / 2.0).max(0.0)
}

/// Length of the joined video after overlapping transitions.
pub fn joined_duration(durations: &[f64], transition: f64) -> f64 {
    let total: f64 = durations.iter().sum();
    total - durations.len().saturating_sub(1) as f64 * transition
}

/// Join labelled streams with xfade, or concat when `transition` is zero.
///
/// Returns the filter text and the label of the joined stream.
pub fn join_chain(labels: &[String], durations: &[f64], transition: f64) -> (String, String) {
    match labels.len() {
        0 => (String::new(), String::new()),
        1 => (String::new(), labels[0].clone()),
        n if transition <= 0.0 => {
            let inputs: String = labels.iter().map(|l| format!("[{l}]")).collect();
            (format!("{inputs}concat=n={n}:v=1:a=0[joined]"), "joined".to_string())
        }
        _ => {
            let mut parts = Vec::with_capacity(labels.len() - 1);
            let mut current = labels[0].clone();
            let mut length = durations[0];
            for (k, next) in labels.iter().enumerate().skip(1) {
                let out = format!("x{k}");
                let offset = (length - transition).max(0.0);
                parts.push(format!(
                    "[{current}][{next}]xfade=transition=fade:duration={transition:.3}:offset={offset:.3}[{out}]"
                ));
                length += durations[k] - transition;
                current = out;
            }
            (parts.join(";"), current)
        }
    }
}

/// Speed factor applied to presentation timestamps so video matches audio.
pub fn retime_factor(video: f64, audio: f64) -> Option<f64> {
    if video > 0.0 && audio > 0.0 && (video - audio).abs() > RETIME_TOLERANCE_SECS {
        Some(audio / video)
    } else {
        None
    }
}

/// Escape text for use inside a quoted drawtext value.
pub fn escape_drawtext(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\\\\\"),
            '\'' => out.push_str("'\\\\\\''"),
            ':' => out.push_str("\\:"),
            '%' => out.push_str("\\%"),
            _ => out.push(c),
        }
    }
    out
}

/// Centered title with a drop shadow for the first few seconds.
pub fn title_filter(title: &str) -> String {
    format!(
        "drawtext=text='{}':fontsize={TITLE_FONT_SIZE}:fontcolor=white:\
         shadowcolor=black:shadowx=3:shadowy=3:\
         x=(w-text_w)/2:y=(h-text_h)/2:enable='between(t,0,{TITLE_SECONDS})'",
        escape_drawtext(title)
    )
}
