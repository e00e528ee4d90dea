//! G-code command source.
//!
//! Reads a program file into a stream of validated [`Command`]s. All
//! rejection happens here, before any motion: malformed words, duplicate
//! letters, missing or conflicting G/M words, unsupported codes and soft
//! limit violations. The executor can assume every command it receives is
//! structurally sound.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use motion::Plane;
use thiserror::Error;

use crate::config::MachineConfig;

/// Errors raised while validating a program, all fatal before motion starts.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GcodeError {
    #[error("line {line}: duplicate parameter '{letter}'")]
    DuplicateParameter { line: usize, letter: char },

    #[error("line {line}: invalid parameter '{token}'")]
    InvalidParameter { line: usize, token: String },

    #[error("line {line}: no G or M command found")]
    MissingCommand { line: usize },

    #[error("line {line}: both G and M command present")]
    ConflictingCommand { line: usize },

    #[error("line {line}: unsupported G-code G{code}")]
    UnsupportedGcode { line: usize, code: String },

    #[error("line {line}: {axis} target {value} outside soft limits [{min}, {max}]")]
    OutOfBounds {
        line: usize,
        axis: char,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("line {line}: {message}")]
    InvalidParameters { line: usize, message: String },
}

/// The motion kind of a validated command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// G00 rapid positioning.
    Rapid,
    /// G01 linear interpolation on the plane its two axis words select.
    LinearInterp,
    /// G02 clockwise circular interpolation on the active plane.
    CircularCw,
    /// G03 counter-clockwise circular interpolation on the active plane.
    CircularCcw,
    /// G17/G18/G19 plane selection; no motion.
    SelectPlane(Plane),
    /// G28 home to the soft-limit minimum of every axis.
    Home,
    /// An M word; accepted and ignored by the executor.
    Misc(u32),
}

/// Parameter words of one command.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Params {
    pub n: Option<i64>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    pub i: Option<f64>,
    pub j: Option<f64>,
    pub k: Option<f64>,
    pub r: Option<f64>,
    pub f: Option<f64>,
}

impl Params {
    /// The axis words present, in X, Y, Z order.
    pub fn axis_words(&self) -> [Option<f64>; 3] {
        [self.x, self.y, self.z]
    }

    fn axis_count(&self) -> usize {
        self.axis_words().iter().flatten().count()
    }
}

/// One validated command with its source line number.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub kind: CommandKind,
    pub params: Params,
    pub line: usize,
}

impl fmt::Display for Command {
    /// Canonical word order: N, the command word, then X Y Z I J K R F.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut words = Vec::new();
        if let Some(n) = self.params.n {
            words.push(format!("N{n}"));
        }
        words.push(match self.kind {
            CommandKind::Rapid => "G00".to_string(),
            CommandKind::LinearInterp => "G01".to_string(),
            CommandKind::CircularCw => "G02".to_string(),
            CommandKind::CircularCcw => "G03".to_string(),
            CommandKind::SelectPlane(Plane::Xy) => "G17".to_string(),
            CommandKind::SelectPlane(Plane::Xz) => "G18".to_string(),
            CommandKind::SelectPlane(Plane::Yz) => "G19".to_string(),
            CommandKind::Home => "G28".to_string(),
            CommandKind::Misc(m) => format!("M{m:02}"),
        });
        for (letter, value) in [
            ('X', self.params.x),
            ('Y', self.params.y),
            ('Z', self.params.z),
            ('I', self.params.i),
            ('J', self.params.j),
            ('K', self.params.k),
            ('R', self.params.r),
            ('F', self.params.f),
        ] {
            if let Some(value) = value {
                words.push(format!("{letter}{value}"));
            }
        }
        f.write_str(&words.join(" "))
    }
}

/// Parse a whole program file. Blank lines and `%` lines are skipped.
pub fn read_program(path: &Path, config: &MachineConfig) -> Result<Vec<Command>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read G-code file {}", path.display()))?;
    let mut commands = Vec::new();
    for (index, line) in text.lines().enumerate() {
        if let Some(command) = parse_line(line, index + 1, config)? {
            commands.push(command);
        }
    }
    Ok(commands)
}

/// Parse and validate one program line. Returns `None` for blank and `%`
/// lines.
pub fn parse_line(
    line: &str,
    line_no: usize,
    config: &MachineConfig,
) -> Result<Option<Command>, GcodeError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('%') {
        return Ok(None);
    }

    let mut params = Params::default();
    let mut g: Option<f64> = None;
    let mut m: Option<f64> = None;
    let mut seen: HashSet<char> = HashSet::new();

    for token in trimmed.to_uppercase().split_whitespace() {
        let letter = token.chars().next().unwrap();
        let payload = &token[letter.len_utf8()..];

        if !letter.is_ascii_alphabetic() {
            return Err(GcodeError::InvalidParameter {
                line: line_no,
                token: token.to_string(),
            });
        }
        if !seen.insert(letter) {
            return Err(GcodeError::DuplicateParameter {
                line: line_no,
                letter,
            });
        }
        let value: f64 = payload.parse().map_err(|_| GcodeError::InvalidParameter {
            line: line_no,
            token: token.to_string(),
        })?;

        match letter {
            'G' => g = Some(value),
            'M' => m = Some(value),
            'N' => {
                if value < 0.0 {
                    return Err(GcodeError::InvalidParameters {
                        line: line_no,
                        message: format!("line number below zero: {value}"),
                    });
                }
                params.n = Some(value as i64);
            }
            'X' | 'Y' | 'Z' => {
                let axis = ['X', 'Y', 'Z'].iter().position(|&a| a == letter).unwrap();
                let (min, max) = config.axes[axis].limits;
                if value < min || value > max {
                    return Err(GcodeError::OutOfBounds {
                        line: line_no,
                        axis: letter,
                        value,
                        min,
                        max,
                    });
                }
                match letter {
                    'X' => params.x = Some(value),
                    'Y' => params.y = Some(value),
                    _ => params.z = Some(value),
                }
            }
            'I' => params.i = Some(value),
            'J' => params.j = Some(value),
            'K' => params.k = Some(value),
            'R' => params.r = Some(value),
            'F' => params.f = Some(value),
            // Other letters are tolerated but carry no meaning here.
            _ => {}
        }
    }

    let kind = match (g, m) {
        (None, None) => return Err(GcodeError::MissingCommand { line: line_no }),
        (Some(_), Some(_)) => return Err(GcodeError::ConflictingCommand { line: line_no }),
        (None, Some(m)) => CommandKind::Misc(m as u32),
        (Some(g), None) => {
            if g.fract() != 0.0 || g < 0.0 {
                return Err(GcodeError::UnsupportedGcode {
                    line: line_no,
                    code: g.to_string(),
                });
            }
            match g as u32 {
                0 => CommandKind::Rapid,
                1 => CommandKind::LinearInterp,
                2 => CommandKind::CircularCw,
                3 => CommandKind::CircularCcw,
                17 => CommandKind::SelectPlane(Plane::Xy),
                18 => CommandKind::SelectPlane(Plane::Xz),
                19 => CommandKind::SelectPlane(Plane::Yz),
                28 => CommandKind::Home,
                code => {
                    return Err(GcodeError::UnsupportedGcode {
                        line: line_no,
                        code: format!("{code:02}"),
                    })
                }
            }
        }
    };

    validate_structure(kind, &params, line_no)?;
    Ok(Some(Command {
        kind,
        params,
        line: line_no,
    }))
}

fn validate_structure(kind: CommandKind, params: &Params, line: usize) -> Result<(), GcodeError> {
    match kind {
        CommandKind::Rapid => {
            if params.axis_count() == 0 {
                return Err(GcodeError::InvalidParameters {
                    line,
                    message: "rapid positioning needs at least one of X, Y, Z".to_string(),
                });
            }
        }
        CommandKind::LinearInterp => {
            if params.axis_count() != 2 {
                return Err(GcodeError::InvalidParameters {
                    line,
                    message: "either XY, XZ, YZ allowed".to_string(),
                });
            }
        }
        CommandKind::CircularCw | CommandKind::CircularCcw => {
            if params.axis_count() != 2 {
                return Err(GcodeError::InvalidParameters {
                    line,
                    message: "circular interpolation needs an end point on exactly two axes"
                        .to_string(),
                });
            }
            let offsets = [params.i, params.j, params.k]
                .iter()
                .flatten()
                .count();
            if params.r.is_none() && offsets != 2 {
                return Err(GcodeError::InvalidParameters {
                    line,
                    message: "missing R or a pair of center offsets".to_string(),
                });
            }
        }
        CommandKind::SelectPlane(_) => {
            if params.axis_count() != 0 {
                return Err(GcodeError::InvalidParameters {
                    line,
                    message: "XYZ not allowed during plane selection".to_string(),
                });
            }
        }
        CommandKind::Home => {
            if params.axis_count() != 0 {
                return Err(GcodeError::InvalidParameters {
                    line,
                    message: "XYZ not allowed during homing".to_string(),
                });
            }
        }
        CommandKind::Misc(_) => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests_support::reference_config;

    fn parse(line: &str) -> Result<Option<Command>, GcodeError> {
        parse_line(line, 1, &reference_config())
    }

    fn parse_ok(line: &str) -> Command {
        parse(line).unwrap().unwrap()
    }

    #[test]
    fn linear_interpolation_with_feed() {
        let cmd = parse_ok("G01 X20 Y40 F60");
        assert_eq!(cmd.kind, CommandKind::LinearInterp);
        assert_eq!(cmd.params.x, Some(20.0));
        assert_eq!(cmd.params.y, Some(40.0));
        assert_eq!(cmd.params.f, Some(60.0));
        assert_eq!(cmd.params.z, None);
    }

    #[test]
    fn whitespace_and_case_are_normalized() {
        let cmd = parse_ok("   g02   x10 y0  r30  ");
        assert_eq!(cmd.kind, CommandKind::CircularCw);
        assert_eq!(cmd.params.r, Some(30.0));
    }

    #[test]
    fn blank_and_comment_lines_are_skipped() {
        assert_eq!(parse("").unwrap(), None);
        assert_eq!(parse("% Start program").unwrap(), None);
        assert_eq!(parse("%G01 X20 Y40 F60").unwrap(), None);
    }

    #[test]
    fn numbers_compare_numerically() {
        assert_eq!(parse_ok("G1 X5 Y5").kind, CommandKind::LinearInterp);
        assert_eq!(parse_ok("G00 X5").kind, CommandKind::Rapid);
    }

    #[test]
    fn missing_and_conflicting_command_words() {
        assert_eq!(parse("L01"), Err(GcodeError::MissingCommand { line: 1 }));
        assert_eq!(parse("X01"), Err(GcodeError::MissingCommand { line: 1 }));
        assert_eq!(
            parse("G01 M01 X10 Y10"),
            Err(GcodeError::ConflictingCommand { line: 1 })
        );
    }

    #[test]
    fn duplicate_words_are_rejected() {
        assert_eq!(
            parse("G01 G01 X10 Y10"),
            Err(GcodeError::DuplicateParameter { line: 1, letter: 'G' })
        );
    }

    #[test]
    fn malformed_words_are_rejected() {
        assert!(matches!(parse("XX"), Err(GcodeError::InvalidParameter { .. })));
        assert!(matches!(parse("G"), Err(GcodeError::InvalidParameter { .. })));
        assert!(matches!(parse("1X0"), Err(GcodeError::InvalidParameter { .. })));
    }

    #[test]
    fn unsupported_codes_are_rejected() {
        assert!(matches!(
            parse("G05 X1"),
            Err(GcodeError::UnsupportedGcode { .. })
        ));
        assert!(matches!(
            parse("G2.5 X1 Y1 R5"),
            Err(GcodeError::UnsupportedGcode { .. })
        ));
    }

    #[test]
    fn soft_limits_are_enforced() {
        // The reference config limits X to [0, 800].
        assert_eq!(
            parse("G00 X1000"),
            Err(GcodeError::OutOfBounds {
                line: 1,
                axis: 'X',
                value: 1000.0,
                min: 0.0,
                max: 800.0,
            })
        );
    }

    #[test]
    fn linear_interpolation_needs_exactly_two_axes() {
        assert!(matches!(
            parse("G01 X20 Y20 Z20"),
            Err(GcodeError::InvalidParameters { .. })
        ));
        assert!(matches!(
            parse("G01 X20"),
            Err(GcodeError::InvalidParameters { .. })
        ));
    }

    #[test]
    fn arcs_need_an_end_point_and_a_center_description() {
        assert!(matches!(
            parse("G02 R30"),
            Err(GcodeError::InvalidParameters { .. })
        ));
        assert!(matches!(
            parse("G02 X10 Y10"),
            Err(GcodeError::InvalidParameters { .. })
        ));
        let cmd = parse_ok("G03 X10 Y10 I5 J5");
        assert_eq!(cmd.kind, CommandKind::CircularCcw);
    }

    #[test]
    fn plane_selection_and_homing_take_no_axis_words() {
        assert_eq!(
            parse_ok("G17").kind,
            CommandKind::SelectPlane(Plane::Xy)
        );
        assert_eq!(parse_ok("G28").kind, CommandKind::Home);
        assert!(matches!(
            parse("G18 X10"),
            Err(GcodeError::InvalidParameters { .. })
        ));
        assert!(matches!(
            parse("G28 Z10"),
            Err(GcodeError::InvalidParameters { .. })
        ));
    }

    #[test]
    fn line_numbers_are_accepted_but_not_negative() {
        let cmd = parse_ok("N10 G00 X5");
        assert_eq!(cmd.params.n, Some(10));
        assert!(matches!(
            parse("N-5 G00 X5"),
            Err(GcodeError::InvalidParameters { .. })
        ));
    }

    #[test]
    fn m_words_pass_through() {
        assert_eq!(parse_ok("M05").kind, CommandKind::Misc(5));
    }

    #[test]
    fn display_uses_canonical_word_order() {
        let cmd = parse_ok("N3 G01 F60 Y40 X20");
        assert_eq!(cmd.to_string(), "N3 G01 X20 Y40 F60");
    }

    #[test]
    fn reads_a_whole_program() {
        let path = std::env::temp_dir().join("cnc-host-gcode-test.ngc");
        std::fs::write(&path, "% Start program\nG00 X5 Y5\nG01 X10 Y10 F60\n\nG28\n").unwrap();
        let program = read_program(&path, &reference_config()).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(program.len(), 3);
        assert_eq!(program[0].kind, CommandKind::Rapid);
        assert_eq!(program[0].line, 2);
        assert_eq!(program[1].kind, CommandKind::LinearInterp);
        assert_eq!(program[2].kind, CommandKind::Home);
    }
}
