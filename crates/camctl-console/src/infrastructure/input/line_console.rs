//! Line-oriented operator console on stdin.
//!
//! Stands in for a gamepad or button panel driver: each line is one
//! command, translated into an [`Intent`].  Numbers the operator types for
//! cameras and matrix ports are 1-based; preset and scene numbers are used
//! as typed.
//!
//! ```text
//! stick 0.5 -0.2        analog pan/tilt
//! zoom 0.8 0            analog zoom triggers (in, out)
//! zoom in 0.5 | zoom out 0.3
//! zoom in|out|stop
//! move up|down|left|right
//! move 0.5 -0.2         same as stick
//! stop
//! focus far|near|stop|auto
//! focus held far|near|both|none
//! preset call 12 | preset set 12
//! preset call | preset store | preset next | preset prev | preset step -5
//! menu open|enter|back|up|down|left|right
//! power on|off
//! camera 2 | camera next | camera prev
//! scene 3 | scene next | scene prev | scene switch | scene studio
//! matrix switch 2 4 | matrix macro lecture | matrix reset | matrix refresh
//! key preset 3 down | key next up | key camera 1 down | key studio down
//! help | quit
//! ```

use camctl_core::protocol::MenuDirection;
use thiserror::Error;
use tokio::io::AsyncBufRead;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tracing::debug;

use crate::application::control_panel::PanelKeyId;
use crate::application::intent::{
    CameraIntent, Intent, MatrixIntent, MenuAction, MoveDirection, SceneIntent,
};
use crate::application::status::StatusReporter;

/// One parsed console line.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Intent(Intent),
    Help,
    Quit,
}

/// Why a line could not be understood.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown command '{0}', type 'help'")]
    UnknownCommand(String),
    #[error("'{command}' needs {expected}")]
    MissingArgument {
        command: &'static str,
        expected: &'static str,
    },
    #[error("'{command}': invalid argument '{value}'")]
    InvalidArgument {
        command: &'static str,
        value: String,
    },
}

pub const HELP: &str = "commands: stick, zoom, move, stop, focus, preset, menu, power, camera, scene, matrix, key, help, quit";

/// Parses one line.  Blank lines and `#` comments yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>, ParseError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();
    let args = args.as_slice();

    let command = match head.to_ascii_lowercase().as_str() {
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        "stick" => camera(parse_stick(args)?),
        "zoom" => camera(parse_zoom(args)?),
        "move" => camera(parse_move(args)?),
        "stop" => camera(CameraIntent::Stop),
        "focus" => camera(parse_focus(args)?),
        "preset" => camera(parse_preset(args)?),
        "menu" => camera(CameraIntent::Menu(parse_menu(args)?)),
        "power" => camera(CameraIntent::Power(parse_on_off(args)?)),
        "camera" => camera(parse_camera(args)?),
        "scene" => ConsoleCommand::Intent(Intent::Scene(parse_scene(args)?)),
        "matrix" => ConsoleCommand::Intent(Intent::Matrix(parse_matrix(args)?)),
        "key" => parse_key(args)?,
        other => return Err(ParseError::UnknownCommand(other.to_string())),
    };
    Ok(Some(command))
}

fn camera(intent: CameraIntent) -> ConsoleCommand {
    ConsoleCommand::Intent(Intent::Camera(intent))
}

fn number<T: std::str::FromStr>(command: &'static str, value: &str) -> Result<T, ParseError> {
    value.parse().map_err(|_| ParseError::InvalidArgument {
        command,
        value: value.to_string(),
    })
}

/// Converts a 1-based operator number to an index.
fn index(command: &'static str, value: &str) -> Result<usize, ParseError> {
    match number::<usize>(command, value)? {
        0 => Err(ParseError::InvalidArgument {
            command,
            value: value.to_string(),
        }),
        n => Ok(n - 1),
    }
}

fn invalid(command: &'static str, value: &str) -> ParseError {
    ParseError::InvalidArgument {
        command,
        value: value.to_string(),
    }
}

fn parse_stick(args: &[&str]) -> Result<CameraIntent, ParseError> {
    match args {
        [x, y] => Ok(CameraIntent::PanTilt {
            x: number::<f64>("stick", x)?.clamp(-1.0, 1.0),
            y: number::<f64>("stick", y)?.clamp(-1.0, 1.0),
        }),
        _ => Err(ParseError::MissingArgument {
            command: "stick",
            expected: "<x> <y>",
        }),
    }
}

fn parse_zoom(args: &[&str]) -> Result<CameraIntent, ParseError> {
    match args {
        ["in"] => Ok(CameraIntent::ZoomIn),
        ["out"] => Ok(CameraIntent::ZoomOut),
        ["stop"] => Ok(CameraIntent::Zoom {
            zoom_in: 0.0,
            zoom_out: 0.0,
        }),
        ["in", value] => Ok(CameraIntent::Zoom {
            zoom_in: number::<f64>("zoom", value)?.clamp(0.0, 1.0),
            zoom_out: 0.0,
        }),
        ["out", value] => Ok(CameraIntent::Zoom {
            zoom_in: 0.0,
            zoom_out: number::<f64>("zoom", value)?.clamp(0.0, 1.0),
        }),
        [zoom_in, zoom_out] => Ok(CameraIntent::Zoom {
            zoom_in: number::<f64>("zoom", zoom_in)?.clamp(0.0, 1.0),
            zoom_out: number::<f64>("zoom", zoom_out)?.clamp(0.0, 1.0),
        }),
        _ => Err(ParseError::MissingArgument {
            command: "zoom",
            expected: "in|out|stop or <in> <out>",
        }),
    }
}

fn parse_move(args: &[&str]) -> Result<CameraIntent, ParseError> {
    match args {
        [_, _] => parse_stick(args),
        _ => parse_direction("move", args).map(CameraIntent::Move),
    }
}

fn parse_direction(command: &'static str, args: &[&str]) -> Result<MoveDirection, ParseError> {
    match args {
        ["up"] => Ok(MoveDirection::Up),
        ["down"] => Ok(MoveDirection::Down),
        ["left"] => Ok(MoveDirection::Left),
        ["right"] => Ok(MoveDirection::Right),
        [other] => Err(invalid(command, other)),
        _ => Err(ParseError::MissingArgument {
            command,
            expected: "up|down|left|right",
        }),
    }
}

fn parse_focus(args: &[&str]) -> Result<CameraIntent, ParseError> {
    match args {
        ["far"] => Ok(CameraIntent::FocusFar),
        ["near"] => Ok(CameraIntent::FocusNear),
        ["stop"] => Ok(CameraIntent::FocusStop),
        ["auto"] => Ok(CameraIntent::FocusAuto),
        ["held", held] => {
            let (far, near) = match *held {
                "far" => (true, false),
                "near" => (false, true),
                "both" => (true, true),
                "none" => (false, false),
                other => return Err(invalid("focus", other)),
            };
            Ok(CameraIntent::Focus { far, near })
        }
        [other, ..] => Err(invalid("focus", other)),
        [] => Err(ParseError::MissingArgument {
            command: "focus",
            expected: "far|near|stop|auto or held <far|near|both|none>",
        }),
    }
}

fn parse_preset(args: &[&str]) -> Result<CameraIntent, ParseError> {
    match args {
        ["call"] => Ok(CameraIntent::CallSelectedPreset),
        ["store"] => Ok(CameraIntent::StoreSelectedPreset),
        ["call", n] => Ok(CameraIntent::CallPreset(number("preset", n)?)),
        ["set", n] => Ok(CameraIntent::SetPreset(number("preset", n)?)),
        ["next"] => Ok(CameraIntent::StepPreset(1)),
        ["prev"] => Ok(CameraIntent::StepPreset(-1)),
        ["step", delta] => Ok(CameraIntent::StepPreset(number("preset", delta)?)),
        [other, ..] => Err(invalid("preset", other)),
        [] => Err(ParseError::MissingArgument {
            command: "preset",
            expected: "call|set|store|next|prev|step",
        }),
    }
}

fn parse_menu(args: &[&str]) -> Result<MenuAction, ParseError> {
    match args {
        ["open"] => Ok(MenuAction::Open),
        ["enter"] => Ok(MenuAction::Enter),
        ["back"] => Ok(MenuAction::Back),
        ["up"] => Ok(MenuAction::Nav(MenuDirection::Up)),
        ["down"] => Ok(MenuAction::Nav(MenuDirection::Down)),
        ["left"] => Ok(MenuAction::Nav(MenuDirection::Left)),
        ["right"] => Ok(MenuAction::Nav(MenuDirection::Right)),
        [other] => Err(invalid("menu", other)),
        _ => Err(ParseError::MissingArgument {
            command: "menu",
            expected: "open|enter|back|up|down|left|right",
        }),
    }
}

fn parse_on_off(args: &[&str]) -> Result<bool, ParseError> {
    match args {
        ["on"] => Ok(true),
        ["off"] => Ok(false),
        [other] => Err(invalid("power", other)),
        _ => Err(ParseError::MissingArgument {
            command: "power",
            expected: "on|off",
        }),
    }
}

fn parse_camera(args: &[&str]) -> Result<CameraIntent, ParseError> {
    match args {
        ["next"] => Ok(CameraIntent::SelectNextCamera),
        ["prev"] => Ok(CameraIntent::SelectPrevCamera),
        [n] => Ok(CameraIntent::SelectCamera(index("camera", n)?)),
        _ => Err(ParseError::MissingArgument {
            command: "camera",
            expected: "<number>|next|prev",
        }),
    }
}

fn parse_scene(args: &[&str]) -> Result<SceneIntent, ParseError> {
    match args {
        ["next"] => Ok(SceneIntent::Next),
        ["prev"] => Ok(SceneIntent::Prev),
        ["switch"] => Ok(SceneIntent::Switch),
        ["studio"] => Ok(SceneIntent::ToggleStudioMode),
        [n] => Ok(SceneIntent::Select(number("scene", n)?)),
        _ => Err(ParseError::MissingArgument {
            command: "scene",
            expected: "<number>|next|prev|switch|studio",
        }),
    }
}

fn parse_matrix(args: &[&str]) -> Result<MatrixIntent, ParseError> {
    match args {
        ["switch", input, output] => Ok(MatrixIntent::Switch {
            input_index: index("matrix", input)?,
            output_index: index("matrix", output)?,
        }),
        ["macro", name] => Ok(MatrixIntent::Macro((*name).to_string())),
        ["reset"] => Ok(MatrixIntent::Reset),
        ["refresh"] => Ok(MatrixIntent::Refresh),
        [other, ..] => Err(invalid("matrix", other)),
        [] => Err(ParseError::MissingArgument {
            command: "matrix",
            expected: "switch <in> <out>|macro <name>|reset|refresh",
        }),
    }
}

fn parse_key(args: &[&str]) -> Result<ConsoleCommand, ParseError> {
    let (key, rest) = match args {
        ["preset", n, rest @ ..] => (PanelKeyId::Preset(index("key", n)?), rest),
        ["camera", n, rest @ ..] => (PanelKeyId::Camera(index("key", n)?), rest),
        ["prev", rest @ ..] => (PanelKeyId::PrevPresetPage, rest),
        ["next", rest @ ..] => (PanelKeyId::NextPresetPage, rest),
        ["studio", rest @ ..] => (PanelKeyId::StudioMode, rest),
        [other, ..] => return Err(invalid("key", other)),
        [] => {
            return Err(ParseError::MissingArgument {
                command: "key",
                expected: "preset <n>|camera <n>|prev|next|studio, then down|up",
            })
        }
    };
    let pressed = match rest {
        ["down"] => true,
        ["up"] => false,
        [other] => return Err(invalid("key", other)),
        _ => {
            return Err(ParseError::MissingArgument {
                command: "key",
                expected: "down|up",
            })
        }
    };
    Ok(ConsoleCommand::Intent(Intent::Panel { key, pressed }))
}

/// Reads lines from `reader` until EOF, forwarding parsed commands.
///
/// Lines that do not parse are reported on the status channel.  Returns when
/// the input ends or the receiver of `commands` is dropped.
pub async fn run_line_reader<R>(
    reader: R,
    commands: mpsc::Sender<ConsoleCommand>,
    status: StatusReporter,
) where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                status.error(format!("console input error: {e}"));
                break;
            }
        };
        match parse_command(&line) {
            Ok(Some(command)) => {
                if commands.send(command).await.is_err() {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => status.error(e.to_string()),
        }
    }
    debug!("console input closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent(line: &str) -> Intent {
        match parse_command(line) {
            Ok(Some(ConsoleCommand::Intent(intent))) => intent,
            other => panic!("'{line}' parsed to {other:?}"),
        }
    }

    #[test]
    fn test_blank_and_comment_lines_are_ignored() {
        assert_eq!(parse_command("   "), Ok(None));
        assert_eq!(parse_command("# operator notes"), Ok(None));
    }

    #[test]
    fn test_stick_values_are_clamped() {
        assert_eq!(
            intent("stick 1.5 -0.25"),
            Intent::Camera(CameraIntent::PanTilt { x: 1.0, y: -0.25 })
        );
    }

    #[test]
    fn test_move_takes_direction_or_axes() {
        assert_eq!(
            intent("move left"),
            Intent::Camera(CameraIntent::Move(MoveDirection::Left))
        );
        assert_eq!(
            intent("move 3 -2"),
            Intent::Camera(CameraIntent::PanTilt { x: 1.0, y: -1.0 })
        );
    }

    #[test]
    fn test_zoom_in_with_amount_drives_in_trigger() {
        assert_eq!(
            intent("zoom in 0.5"),
            Intent::Camera(CameraIntent::Zoom {
                zoom_in: 0.5,
                zoom_out: 0.0
            })
        );
        assert_eq!(intent("zoom out"), Intent::Camera(CameraIntent::ZoomOut));
    }

    #[test]
    fn test_camera_numbers_are_one_based() {
        assert_eq!(intent("camera 2"), Intent::Camera(CameraIntent::SelectCamera(1)));
        assert!(matches!(
            parse_command("camera 0"),
            Err(ParseError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_preset_forms() {
        assert_eq!(intent("preset call 12"), Intent::Camera(CameraIntent::CallPreset(12)));
        assert_eq!(intent("preset set 0"), Intent::Camera(CameraIntent::SetPreset(0)));
        assert_eq!(intent("preset call"), Intent::Camera(CameraIntent::CallSelectedPreset));
        assert_eq!(intent("preset step -5"), Intent::Camera(CameraIntent::StepPreset(-5)));
    }

    #[test]
    fn test_focus_held_maps_to_button_state() {
        assert_eq!(
            intent("focus held both"),
            Intent::Camera(CameraIntent::Focus { far: true, near: true })
        );
    }

    #[test]
    fn test_matrix_switch_uses_one_based_indices() {
        assert_eq!(
            intent("matrix switch 2 4"),
            Intent::Matrix(MatrixIntent::Switch {
                input_index: 1,
                output_index: 3
            })
        );
        assert_eq!(
            intent("matrix macro lecture"),
            Intent::Matrix(MatrixIntent::Macro("lecture".to_string()))
        );
    }

    #[test]
    fn test_panel_key_commands() {
        assert_eq!(
            intent("key preset 3 down"),
            Intent::Panel {
                key: PanelKeyId::Preset(2),
                pressed: true
            }
        );
        assert_eq!(
            intent("key studio up"),
            Intent::Panel {
                key: PanelKeyId::StudioMode,
                pressed: false
            }
        );
        assert!(parse_command("key next sideways").is_err());
    }

    #[test]
    fn test_unknown_command_is_an_error() {
        assert_eq!(
            parse_command("teleport"),
            Err(ParseError::UnknownCommand("teleport".to_string()))
        );
    }

    #[tokio::test]
    async fn test_reader_forwards_commands_and_reports_bad_lines() {
        // Arrange: lines split across reads, as a terminal delivers them.
        let input = tokio_test::io::Builder::new()
            .read(b"scene ne")
            .read(b"xt\nbogus\n")
            .read(b"quit\n")
            .build();
        let (tx, mut rx) = mpsc::channel(8);
        let (status, mut status_rx) = StatusReporter::channel();

        // Act
        run_line_reader(tokio::io::BufReader::new(input), tx, status).await;

        // Assert
        assert_eq!(
            rx.recv().await,
            Some(ConsoleCommand::Intent(Intent::Scene(SceneIntent::Next)))
        );
        assert_eq!(rx.recv().await, Some(ConsoleCommand::Quit));
        assert_eq!(rx.recv().await, None);
        let message = status_rx.recv().await.unwrap();
        assert!(message.text.contains("bogus"));
    }
}
