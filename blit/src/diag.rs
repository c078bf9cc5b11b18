//! Diagnostic commands for comparing the backends on a running device.
//!
//! Commands arrive over a control channel as four-character codes. The
//! framing is the transport's business; this module only interprets the
//! decoded codes.
use log::info;
use quick_error::quick_error;
use std::fmt;

use crate::{dispatch::Backend, pen::Pen, surface::Surface};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// `DUMP`: report the current backend and pen.
    Dump,
    /// `DMA2`: enable the accelerator.
    Dma2,
    /// `SOFT`: disable the accelerator.
    Soft,
    /// `SOLI`: switch to an opaque test pen.
    Solid,
    /// `ALPH`: switch to a translucent test pen.
    Alpha,
}

quick_error! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum CommandError {
        Unknown(code: [u8; 4]) {
            display("unknown command {:?}", String::from_utf8_lossy(code))
        }
    }
}

impl Command {
    pub fn parse(code: [u8; 4]) -> Result<Self, CommandError> {
        Ok(match &code {
            b"DUMP" => Command::Dump,
            b"DMA2" => Command::Dma2,
            b"SOFT" => Command::Soft,
            b"SOLI" => Command::Solid,
            b"ALPH" => Command::Alpha,
            _ => return Err(CommandError::Unknown(code)),
        })
    }

    pub fn code(self) -> [u8; 4] {
        *match self {
            Command::Dump => b"DUMP",
            Command::Dma2 => b"DMA2",
            Command::Soft => b"SOFT",
            Command::Solid => b"SOLI",
            Command::Alpha => b"ALPH",
        }
    }
}

/// The state controlled by diagnostic commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Diag {
    /// The pen used by the test workload.
    pub pen: Pen,
}

impl Default for Diag {
    fn default() -> Self {
        Self {
            pen: Pen::new(0x11, 0x22, 0xff, 255),
        }
    }
}

/// The response to [`Command::Dump`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub backend: Backend,
    pub translucent: bool,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let backend = match self.backend {
            Backend::Hardware => "DMA2D",
            Backend::Software => "software",
        };
        let pen = if self.translucent {
            "Alpha pen"
        } else {
            "Solid pen"
        };
        write!(f, "{} {}", backend, pen)
    }
}

impl Diag {
    pub const SOLID_PEN: Pen = Pen {
        r: 0,
        g: 0,
        b: 255,
        a: 255,
    };
    pub const ALPHA_PEN: Pen = Pen {
        r: 0,
        g: 0,
        b: 255,
        a: 10,
    };

    /// Apply `command` to `self` and `surface`, the surface the test
    /// workload draws to.
    ///
    /// Only [`Command::Dump`] produces a response.
    pub fn apply(&mut self, command: Command, surface: &mut Surface<'_>) -> Option<Summary> {
        match command {
            Command::Dump => {
                let summary = Summary {
                    backend: if surface.use_accelerator {
                        Backend::Hardware
                    } else {
                        Backend::Software
                    },
                    translucent: self.pen.a < 255,
                };
                info!("{}", summary);
                return Some(summary);
            }
            Command::Dma2 => surface.use_accelerator = true,
            Command::Soft => surface.use_accelerator = false,
            Command::Solid => self.pen = Self::SOLID_PEN,
            Command::Alpha => self.pen = Self::ALPHA_PEN,
        }
        info!("Setting {}", String::from_utf8_lossy(&command.code()));
        None
    }
}
