//! Frame presenter: color buffer -> terminal, or -> PPM file.

use std::fmt::Write as FmtWrite;
use std::fs::File;
use std::io::{self, BufWriter, Stdout, Write};
use std::path::Path;

use crossterm::{cursor, execute, queue, terminal};
use rayon::prelude::*;

use crate::kernel::Color;

/// ASCII luminance ramp, darkest first.
const RAMP: &[u8] = b" .'`^\",:;Il!i><~+_-?][}{1)(|\\/tfjrxnuvczXYUJCLQ0OZmwqpdbkhao*#MW&8%B@$";

/// Gamma used for ASCII glyph selection and tint.
const ASCII_GAMMA: f32 = 0.3;

/// sRGB-ish 8-bit value with a gamma of 2.
pub fn to_rgb8(c: &Color) -> [u8; 3] {
    let channel = |v: f32| (v.max(0.0).sqrt() * 255.0).clamp(0.0, 255.0) as u8;
    [channel(c[0]), channel(c[1]), channel(c[2])]
}

fn luminance(c: &Color) -> f32 {
    0.2126 * c[0] + 0.7152 * c[1] + 0.0722 * c[2]
}

/// Render the color buffer as ANSI text, one line per row. Rows are built
/// in parallel, then joined.
pub fn frame_to_ansi(colors: &[Color], width: u32, height: u32, full_color: bool) -> String {
    let width = width as usize;
    if width == 0 {
        return String::new();
    }

    let rows: Vec<String> = colors
        .par_chunks(width)
        .take(height as usize)
        .map(|pixels| {
            let mut row = String::with_capacity(width * 20);
            for pixel in pixels {
                if full_color {
                    let [r, g, b] = to_rgb8(pixel);
                    let _ = write!(row, "\x1b[38;2;{r};{g};{b}m█");
                } else {
                    let tint = |v: f32| (v.max(0.0).powf(ASCII_GAMMA) * 255.0).clamp(0.0, 255.0) as u8;
                    let (r, g, b) = (tint(pixel[0]), tint(pixel[1]), tint(pixel[2]));
                    let level = luminance(pixel).max(0.0).powf(ASCII_GAMMA) * (RAMP.len() - 1) as f32;
                    let glyph = RAMP[(level as usize).min(RAMP.len() - 1)] as char;
                    let _ = write!(row, "\x1b[38;2;{r};{g};{b}m{glyph}");
                }
            }
            row.push_str("\x1b[0m\r\n");
            row
        })
        .collect();

    rows.concat()
}

/// Write the color buffer as a binary PPM (P6).
///
/// Fails with `InvalidInput`, without touching `path`, when `colors` holds
/// fewer than `width * height` pixels.
pub fn write_ppm(path: &Path, colors: &[Color], width: u32, height: u32) -> io::Result<()> {
    let pixels = width as usize * height as usize;
    if colors.len() < pixels {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} colors for a {width}x{height} image", colors.len()),
        ));
    }

    let mut out = BufWriter::new(File::create(path)?);
    write!(out, "P6\n{width} {height}\n255\n")?;
    for pixel in &colors[..pixels] {
        out.write_all(&to_rgb8(pixel))?;
    }
    out.flush()
}

/// Raw mode and hidden cursor for the lifetime of the value.
pub struct TerminalSession {
    _private: (),
}

impl TerminalSession {
    pub fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        execute!(io::stdout(), cursor::Hide, terminal::Clear(terminal::ClearType::All))?;
        Ok(Self { _private: () })
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        let _ = execute!(io::stdout(), cursor::Show);
        let _ = terminal::disable_raw_mode();
    }
}

/// Draws whole frames at the top-left of the terminal.
pub struct Presenter {
    full_color: bool,
    out: Stdout,
}

impl Presenter {
    pub fn new(full_color: bool) -> Self {
        Self {
            full_color,
            out: io::stdout(),
        }
    }

    pub fn present(&mut self, colors: &[Color], width: u32, height: u32, status: &str) -> io::Result<()> {
        let mut frame = frame_to_ansi(colors, width, height, self.full_color);
        frame.push_str(status);
        frame.push_str("\x1b[K");

        let mut out = self.out.lock();
        queue!(out, cursor::MoveTo(0, 0))?;
        out.write_all(frame.as_bytes())?;
        out.flush()
    }
}
