//! Compositor backend selection and command vocabulary
//!
//! Two families of compositor control protocols are supported:
//!
//! - **Sway-like** (`$SWAYSOCK`, `$MIRACLESOCK`): i3 IPC binary framing on a
//!   persistent Unix socket.
//! - **Hyprland-like** (`$HYPRLAND_INSTANCE_SIGNATURE`): plain-text requests,
//!   one socket connection per request at
//!   `$XDG_RUNTIME_DIR/hypr/<signature>/.socket.sock`.
//!
//! The backend is chosen once at startup from the environment and never
//! changes afterwards.

use std::ffi::OsString;
use std::path::PathBuf;

use thiserror::Error;

use crate::sensors::Orientation;

const SWAYSOCK_ENV: &str = "SWAYSOCK";
const MIRACLESOCK_ENV: &str = "MIRACLESOCK";
const HYPRLAND_SIGNATURE_ENV: &str = "HYPRLAND_INSTANCE_SIGNATURE";
const RUNTIME_DIR_ENV: &str = "XDG_RUNTIME_DIR";

/// Directory under `$XDG_RUNTIME_DIR` that holds Hyprland instance sockets
const HYPRLAND_NAMESPACE: &str = "hypr";
/// Control socket file inside a Hyprland instance directory
const HYPRLAND_CONTROL_SOCKET: &str = ".socket.sock";

/// Largest command payload accepted by the sway-like backend
///
/// Together with the 14-byte header a frame never exceeds 128 bytes.
pub const SWAY_MAX_PAYLOAD: usize = 114;

/// Largest command accepted by the hyprland-like backend
pub const HYPRLAND_MAX_PAYLOAD: usize = 178;

/// Errors raised while selecting a backend from the environment
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectError {
    /// None of the recognized compositor variables is set
    #[error(
        "no supported compositor found: set SWAYSOCK, MIRACLESOCK or HYPRLAND_INSTANCE_SIGNATURE"
    )]
    NoSupportedEnvironment,

    /// Hyprland was detected but its socket directory cannot be derived
    #[error("HYPRLAND_INSTANCE_SIGNATURE is set but XDG_RUNTIME_DIR is not")]
    MissingRuntimeDir,
}

/// Compositor protocol family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// i3/sway IPC: binary header, JSON responses, persistent connection
    Sway,
    /// Hyprland request socket: plain text, connection per request
    Hyprland,
}

/// How long one socket connection lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
    /// One connection for the whole process
    Persistent,
    /// A fresh connection for every request; the peer closes it after replying
    PerRequest,
}

/// Backend word for each display orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrientationWords {
    pub normal: &'static str,
    pub bottom_up: &'static str,
    pub left_up: &'static str,
    pub right_up: &'static str,
}

impl OrientationWords {
    pub fn word(&self, orientation: Orientation) -> &'static str {
        match orientation {
            Orientation::Normal => self.normal,
            Orientation::BottomUp => self.bottom_up,
            Orientation::LeftUp => self.left_up,
            Orientation::RightUp => self.right_up,
        }
    }
}

/// Per-backend command vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vocabulary {
    /// Output property that carries the rotation
    pub rotate_word: &'static str,
    /// Transform value for each orientation
    pub orientations: OrientationWords,
    /// Command for tilt changes; no backend defines one yet
    pub tilt_word: Option<&'static str>,
    pub power_on_word: &'static str,
    pub power_off_word: &'static str,
    /// Program used to set the backlight
    pub brightness_word: &'static str,
    /// Request that lists outputs
    pub list_outputs: &'static str,
    /// How replies to commands and output listings are read
    pub replies: ReplyFormat,
}

/// Shape of compositor replies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyFormat {
    /// JSON: commands answer `[{"success": bool, ...}]`, the output listing
    /// is an array of objects carrying `name`
    Json,
    /// Free text scanned for markers
    Text {
        /// Prefix of a successful command reply
        ack: &'static str,
        /// Text preceding the first output name in a listing
        name_marker: &'static str,
        /// Character that ends an output name in a listing
        name_terminator: char,
    },
}

const SWAY_VOCABULARY: Vocabulary = Vocabulary {
    rotate_word: "transform",
    orientations: OrientationWords {
        normal: "normal",
        bottom_up: "180",
        left_up: "270",
        right_up: "90",
    },
    tilt_word: None,
    power_on_word: "power on",
    power_off_word: "power off",
    brightness_word: "brightnessctl set",
    list_outputs: "",
    replies: ReplyFormat::Json,
};

const HYPRLAND_VOCABULARY: Vocabulary = Vocabulary {
    rotate_word: "transform",
    orientations: OrientationWords {
        normal: "0",
        bottom_up: "2",
        left_up: "3",
        right_up: "1",
    },
    tilt_word: None,
    power_on_word: "dpms on",
    power_off_word: "dpms off",
    brightness_word: "brightnessctl set",
    list_outputs: "monitors",
    replies: ReplyFormat::Text {
        ack: "ok",
        name_marker: "Monitor ",
        name_terminator: ' ',
    },
};

impl Backend {
    /// Human readable backend name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sway => "sway",
            Self::Hyprland => "hyprland",
        }
    }

    pub fn vocabulary(&self) -> &'static Vocabulary {
        match self {
            Self::Sway => &SWAY_VOCABULARY,
            Self::Hyprland => &HYPRLAND_VOCABULARY,
        }
    }

    pub fn lifetime(&self) -> Lifetime {
        match self {
            Self::Sway => Lifetime::Persistent,
            Self::Hyprland => Lifetime::PerRequest,
        }
    }

    /// Upper bound on the payload of a single request
    pub fn max_payload(&self) -> usize {
        match self {
            Self::Sway => SWAY_MAX_PAYLOAD,
            Self::Hyprland => HYPRLAND_MAX_PAYLOAD,
        }
    }

    /// Command that rotates `display` to `orientation`
    pub fn rotate_command(&self, display: &str, orientation: Orientation) -> String {
        let vocab = self.vocabulary();
        let value = vocab.orientations.word(orientation);
        match self {
            Self::Sway => format!("output {} {} {}", display, vocab.rotate_word, value),
            Self::Hyprland => {
                format!("keyword monitor {},{},{}", display, vocab.rotate_word, value)
            }
        }
    }

    /// Command that switches `display` on or off
    pub fn power_command(&self, display: &str, on: bool) -> String {
        let vocab = self.vocabulary();
        let word = if on {
            vocab.power_on_word
        } else {
            vocab.power_off_word
        };
        match self {
            Self::Sway => format!("output {} {}", display, word),
            Self::Hyprland => format!("dispatch {} {}", word, display),
        }
    }

    /// Command that sets the backlight to `percent`
    pub fn brightness_command(&self, percent: u8) -> String {
        let word = self.vocabulary().brightness_word;
        match self {
            Self::Sway => format!("exec {} {}%", word, percent),
            Self::Hyprland => format!("dispatch exec {} {}%", word, percent),
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of backend selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub backend: Backend,
    /// Control socket of the running compositor
    pub socket_path: PathBuf,
    /// Environment variable that decided the selection
    pub source: &'static str,
}

/// Select the compositor backend from the process environment
///
/// Signals are checked in a fixed order and the first one present wins:
/// `SWAYSOCK`, `MIRACLESOCK`, then `HYPRLAND_INSTANCE_SIGNATURE`.
///
/// # Errors
///
/// Returns `SelectError::NoSupportedEnvironment` if no signal is present.
/// Returns `SelectError::MissingRuntimeDir` if Hyprland is detected without
/// `XDG_RUNTIME_DIR`.
pub fn select_backend() -> Result<Selection, SelectError> {
    select_backend_with(|name| std::env::var_os(name))
}

/// Same as [`select_backend`] with an injectable variable lookup
pub fn select_backend_with<F>(lookup: F) -> Result<Selection, SelectError>
where
    F: Fn(&str) -> Option<OsString>,
{
    // Empty variables count as unset
    let var = |name: &str| lookup(name).filter(|value| !value.is_empty());

    for source in [SWAYSOCK_ENV, MIRACLESOCK_ENV] {
        if let Some(path) = var(source) {
            return Ok(Selection {
                backend: Backend::Sway,
                socket_path: PathBuf::from(path),
                source,
            });
        }
    }

    if let Some(signature) = var(HYPRLAND_SIGNATURE_ENV) {
        let runtime_dir = var(RUNTIME_DIR_ENV).ok_or(SelectError::MissingRuntimeDir)?;
        let socket_path = PathBuf::from(runtime_dir)
            .join(HYPRLAND_NAMESPACE)
            .join(signature)
            .join(HYPRLAND_CONTROL_SOCKET);
        return Ok(Selection {
            backend: Backend::Hyprland,
            socket_path,
            source: HYPRLAND_SIGNATURE_ENV,
        });
    }

    Err(SelectError::NoSupportedEnvironment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<OsString> {
        let map: HashMap<String, OsString> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), OsString::from(v)))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_swaysock_selects_sway() {
        let selection = select_backend_with(env(&[("SWAYSOCK", "/run/user/1000/sway-ipc.sock")]))
            .unwrap();
        assert_eq!(selection.backend, Backend::Sway);
        assert_eq!(selection.socket_path, PathBuf::from("/run/user/1000/sway-ipc.sock"));
        assert_eq!(selection.source, "SWAYSOCK");
        assert_eq!(selection.backend.lifetime(), Lifetime::Persistent);
    }

    #[test]
    fn test_miraclesock_selects_sway_protocol() {
        let selection =
            select_backend_with(env(&[("MIRACLESOCK", "/run/user/1000/miracle.sock")])).unwrap();
        assert_eq!(selection.backend, Backend::Sway);
        assert_eq!(selection.source, "MIRACLESOCK");
    }

    #[test]
    fn test_hyprland_socket_path_is_synthesized() {
        let selection = select_backend_with(env(&[
            ("HYPRLAND_INSTANCE_SIGNATURE", "abc_123"),
            ("XDG_RUNTIME_DIR", "/run/user/1000"),
        ]))
        .unwrap();
        assert_eq!(selection.backend, Backend::Hyprland);
        assert_eq!(
            selection.socket_path,
            PathBuf::from("/run/user/1000/hypr/abc_123/.socket.sock")
        );
        assert_eq!(selection.backend.lifetime(), Lifetime::PerRequest);
    }

    #[test]
    fn test_sway_wins_over_hyprland() {
        let selection = select_backend_with(env(&[
            ("HYPRLAND_INSTANCE_SIGNATURE", "abc_123"),
            ("XDG_RUNTIME_DIR", "/run/user/1000"),
            ("SWAYSOCK", "/tmp/sway.sock"),
        ]))
        .unwrap();
        assert_eq!(selection.backend, Backend::Sway);
    }

    #[test]
    fn test_hyprland_without_runtime_dir() {
        let result = select_backend_with(env(&[("HYPRLAND_INSTANCE_SIGNATURE", "abc_123")]));
        assert_eq!(result, Err(SelectError::MissingRuntimeDir));
    }

    #[test]
    fn test_no_environment() {
        let result = select_backend_with(env(&[("XDG_RUNTIME_DIR", "/run/user/1000")]));
        assert_eq!(result, Err(SelectError::NoSupportedEnvironment));
    }

    #[test]
    fn test_empty_variable_is_ignored() {
        let result = select_backend_with(env(&[("SWAYSOCK", "")]));
        assert_eq!(result, Err(SelectError::NoSupportedEnvironment));
    }

    #[test]
    fn test_sway_commands() {
        let backend = Backend::Sway;
        assert_eq!(
            backend.rotate_command("eDP-1", Orientation::LeftUp),
            "output eDP-1 transform 270"
        );
        assert_eq!(backend.power_command("eDP-1", false), "output eDP-1 power off");
        assert_eq!(backend.power_command("eDP-1", true), "output eDP-1 power on");
        assert_eq!(backend.brightness_command(42), "exec brightnessctl set 42%");
    }

    #[test]
    fn test_hyprland_commands() {
        let backend = Backend::Hyprland;
        assert_eq!(
            backend.rotate_command("eDP-1", Orientation::BottomUp),
            "keyword monitor eDP-1,transform,2"
        );
        assert_eq!(backend.power_command("eDP-1", false), "dispatch dpms off eDP-1");
        assert_eq!(backend.brightness_command(7), "dispatch exec brightnessctl set 7%");
    }
}
