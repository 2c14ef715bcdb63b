//! Text and CSV rendering of batch results

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::str::FromStr;

use crate::core::Position;
use crate::processing::batch::BatchItem;

/// Where reports are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Stdout,
    File(PathBuf),
}

impl FromStr for OutputTarget {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "stdout" | "-" => OutputTarget::Stdout,
            path => OutputTarget::File(PathBuf::from(path)),
        })
    }
}

impl fmt::Display for OutputTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputTarget::Stdout => write!(f, "stdout"),
            OutputTarget::File(path) => write!(f, "{}", path.display()),
        }
    }
}

impl OutputTarget {
    pub fn is_stdout(&self) -> bool {
        matches!(self, OutputTarget::Stdout)
    }

    /// Open a buffered writer for this target
    pub fn open(&self) -> io::Result<Box<dyn Write>> {
        Ok(match self {
            OutputTarget::Stdout => Box::new(BufWriter::new(io::stdout())),
            OutputTarget::File(path) => Box::new(BufWriter::new(File::create(path)?)),
        })
    }
}

/// Renders batch items line by line
pub trait ResultFormatter {
    /// Section title printed before the lines on interactive output
    fn title(&self) -> &'static str;

    fn format_item(&self, item: &BatchItem) -> String;

    /// Write every item, preceded by the title block when `with_title` is set
    fn write_report<W: Write>(&self, out: &mut W, items: &[BatchItem], with_title: bool) -> io::Result<()>
    where
        Self: Sized,
    {
        if with_title {
            writeln!(out)?;
            writeln!(out, "{}", self.title())?;
            writeln!(out, "----------")?;
        }
        for item in items {
            writeln!(out, "{}", self.format_item(item))?;
        }
        out.flush()
    }
}

/// `X: <x>, Y: <y>` lines with five decimals
#[derive(Debug, Clone, Copy, Default)]
pub struct TextFormatter;

impl TextFormatter {
    pub fn format_position(position: &Position) -> String {
        format!("X: {:.5}, Y: {:.5}", position.x, position.y)
    }
}

impl ResultFormatter for TextFormatter {
    fn title(&self) -> &'static str {
        "Positioning Results"
    }

    fn format_item(&self, item: &BatchItem) -> String {
        match &item.result {
            Ok(solution) => {
                let mut line = Self::format_position(&solution.estimate.position);
                if solution.converged == Some(false) {
                    line.push_str(" (not converged)");
                }
                line
            }
            Err(e) => format!("Error: {}", e),
        }
    }
}

/// `elapsed_us,x,y` rows; failed items become `#` comment rows
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvFormatter;

impl ResultFormatter for CsvFormatter {
    fn title(&self) -> &'static str {
        "Timing Results"
    }

    fn format_item(&self, item: &BatchItem) -> String {
        match &item.result {
            Ok(solution) => format!(
                "{},{:.5},{:.5}",
                item.elapsed_us, solution.estimate.position.x, solution.estimate.position.y
            ),
            Err(e) => format!("# {}: {}", item.index, e),
        }
    }
}
