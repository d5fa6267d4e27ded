//! Input files
//!
//! Plain-text formats:
//! - waypoints: one `x,y` (or `x y`) pair per line
//! - sampling intervals: one duration (seconds) per line
//! - tracking space: polygons of `x,y` lines separated by blank lines; the
//!   first polygon is the boundary, the rest are obstacles
//! - command file: `key = value` lines describing a batch of trials
//!
//! Numbers are reported with 1-based line numbers on failure.

use std::path::{Path, PathBuf};

use glam::Vec2;

use crate::consts::TARGET_AREA;
use crate::error::ConfigError;
use crate::generate::generate_tracking_space;
use crate::geometry::{Polygon, Pose};
use crate::settings::{
    AvatarConfig, PathSeedKind, PathSource, RedirectorKind, ResetterKind, Settings,
    TrackingSpaceKind, TrialSetup,
};
use crate::sim::state::TrackingSpace;

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_number(value: &str, line: usize) -> Result<f32, ConfigError> {
    value
        .trim()
        .parse::<f32>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ConfigError::InvalidNumber {
            line,
            value: value.trim().to_string(),
        })
}

/// Comma-separated numbers, or whitespace-separated when there is no comma
fn split_fields(text: &str) -> Vec<&str> {
    if text.contains(',') {
        text.split(',').map(str::trim).collect()
    } else {
        text.split_whitespace().collect()
    }
}

fn parse_numbers<const N: usize>(text: &str, line: usize) -> Result<[f32; N], ConfigError> {
    let fields = split_fields(text);
    if fields.len() != N {
        return Err(ConfigError::MalformedLine {
            line,
            expected: N,
            found: fields.len(),
        });
    }
    let mut values = [0.0; N];
    for (value, field) in values.iter_mut().zip(fields) {
        *value = parse_number(field, line)?;
    }
    Ok(values)
}

/// Parse a waypoints file; with `first_is_start` every point is made relative to the first
pub fn parse_waypoints(text: &str, first_is_start: bool) -> Result<Vec<Vec2>, ConfigError> {
    let mut waypoints = Vec::new();
    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let [x, y] = parse_numbers::<2>(line, index + 1)?;
        waypoints.push(Vec2::new(x, y));
    }
    if first_is_start && let Some(&first) = waypoints.first() {
        for p in &mut waypoints {
            *p -= first;
        }
    }
    Ok(waypoints)
}

pub fn parse_sampling_intervals(text: &str) -> Result<Vec<f32>, ConfigError> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| parse_number(line, index + 1))
        .collect()
}

fn close_obstacle(polygon: Polygon, obstacles: &mut Vec<Polygon>) {
    if polygon.len() > 2 {
        obstacles.push(polygon);
    } else if !polygon.is_empty() {
        log::warn!("Skipping obstacle with {} points", polygon.len());
    }
}

/// Parse a tracking space file; obstacles with fewer than 3 points are dropped
pub fn parse_tracking_space(text: &str) -> Result<TrackingSpace, ConfigError> {
    let mut boundary: Polygon = Vec::new();
    let mut obstacles: Vec<Polygon> = Vec::new();
    let mut current: Polygon = Vec::new();
    let mut in_obstacles = false;

    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            if in_obstacles {
                close_obstacle(std::mem::take(&mut current), &mut obstacles);
            }
            in_obstacles = true;
            continue;
        }
        let [x, y] = parse_numbers::<2>(line, index + 1)?;
        if in_obstacles {
            current.push(Vec2::new(x, y));
        } else {
            boundary.push(Vec2::new(x, y));
        }
    }
    close_obstacle(current, &mut obstacles);

    let space = TrackingSpace::new(boundary, obstacles);
    space.validate()?;
    Ok(space)
}

pub fn load_waypoints(path: &Path, first_is_start: bool) -> Result<Vec<Vec2>, ConfigError> {
    parse_waypoints(&read_file(path)?, first_is_start)
}

pub fn load_sampling_intervals(path: &Path) -> Result<Vec<f32>, ConfigError> {
    parse_sampling_intervals(&read_file(path)?)
}

pub fn load_tracking_space(path: &Path) -> Result<TrackingSpace, ConfigError> {
    let space = parse_tracking_space(&read_file(path)?)?;
    log::info!(
        "Loaded tracking space from {} ({} obstacles)",
        path.display(),
        space.obstacles.len()
    );
    Ok(space)
}

/// One trial read from a command file, with the settings in force at its `end`
#[derive(Debug, Clone)]
pub struct CommandTrial {
    pub settings: Settings,
    pub setup: TrialSetup,
}

/// Avatar being described; copied forward to the next `newUser`
#[derive(Debug, Clone, Default)]
struct AvatarDraft {
    redirector: RedirectorKind,
    resetter: ResetterKind,
    path_seed: PathSeedKind,
    waypoints_file: Option<PathBuf>,
    sampling_intervals_file: Option<PathBuf>,
    initial_pose: Option<Pose>,
    physical_target: Option<Pose>,
}

/// Keys describing the avatar opened by the last `newUser`
const AVATAR_KEYS: [&str; 7] = [
    "redirector",
    "resetter",
    "pathseedchoice",
    "waypointsfilepath",
    "samplingintervalsfilepath",
    "initialconfiguration",
    "physicaltarget",
];

/// Trial-wide state of the command parser
struct CommandParser<'a> {
    base_dir: &'a Path,
    settings: Settings,
    avatar: AvatarDraft,
    pending: Vec<(AvatarConfig, bool)>,
    first_avatar: bool,
    space_kind: TrackingSpaceKind,
    obstacle_type: u8,
    square_width: f32,
    space_file: Option<PathBuf>,
    seed: u64,
    trials: Vec<CommandTrial>,
}

impl<'a> CommandParser<'a> {
    fn new(base_dir: &'a Path, settings: Settings) -> Self {
        let seed = settings.seed;
        Self {
            base_dir,
            settings,
            avatar: AvatarDraft {
                resetter: ResetterKind::Null,
                path_seed: PathSeedKind::StraightLine,
                ..Default::default()
            },
            pending: Vec::new(),
            first_avatar: true,
            space_kind: TrackingSpaceKind::Rectangle,
            obstacle_type: 0,
            square_width: TARGET_AREA.sqrt(),
            space_file: None,
            seed,
            trials: Vec::new(),
        }
    }

    fn resolve(&self, value: &str) -> PathBuf {
        let path = Path::new(value);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    fn choice<T>(
        kind: &'static str,
        value: &str,
        line: usize,
        parse: fn(&str) -> Option<T>,
    ) -> Result<T, ConfigError> {
        parse(value).ok_or_else(|| ConfigError::UnknownChoice {
            line,
            kind,
            value: value.to_string(),
        })
    }

    fn pose(value: &str, line: usize) -> Result<Pose, ConfigError> {
        let [x, y, fx, fy] = parse_numbers::<4>(value, line)?;
        Ok(Pose::new(Vec2::new(x, y), Vec2::new(fx, fy)))
    }

    /// Close the current avatar; the next one starts as a copy without a start pose
    fn push_avatar(&mut self) -> Result<(), ConfigError> {
        let draft = &self.avatar;
        let path = match draft.path_seed {
            PathSeedKind::FilePath => {
                let file = draft
                    .waypoints_file
                    .as_deref()
                    .ok_or(ConfigError::MissingFile { what: "waypoints file" })?;
                PathSource::Waypoints(load_waypoints(file, self.settings.first_waypoint_is_start_point)?)
            }
            PathSeedKind::RealUserPath => {
                let (Some(waypoints), Some(intervals)) =
                    (&draft.waypoints_file, &draft.sampling_intervals_file)
                else {
                    return Err(ConfigError::MissingFile { what: "real user path" });
                };
                PathSource::RealUserPath {
                    waypoints: load_waypoints(waypoints, self.settings.first_waypoint_is_start_point)?,
                    sampling_intervals: load_sampling_intervals(intervals)?,
                }
            }
            kind => PathSource::Seed(kind),
        };
        let config = AvatarConfig {
            redirector: draft.redirector,
            resetter: draft.resetter,
            path,
            initial_pose: draft.initial_pose.unwrap_or_default(),
            physical_target: draft.physical_target,
        };
        self.pending.push((config, draft.initial_pose.is_some()));
        self.avatar.initial_pose = None;
        Ok(())
    }

    /// Close the trial: build the space and hand out default start poses
    fn end_trial(&mut self) -> Result<(), ConfigError> {
        self.push_avatar()?;
        let (tracking_space, defaults) = match self.space_kind {
            TrackingSpaceKind::FilePath => {
                let file = self
                    .space_file
                    .as_deref()
                    .ok_or(ConfigError::MissingFile { what: "tracking space file" })?;
                (load_tracking_space(file)?, Vec::new())
            }
            kind => {
                let generated = generate_tracking_space(kind, self.obstacle_type, self.square_width)?;
                (generated.space, generated.initial_poses)
            }
        };
        let avatars = std::mem::take(&mut self.pending)
            .into_iter()
            .enumerate()
            .map(|(id, (mut config, explicit_pose))| {
                if !explicit_pose && !defaults.is_empty() {
                    config.initial_pose = defaults[id % defaults.len()];
                }
                config
            })
            .collect();
        let mut setup = TrialSetup::new(tracking_space, avatars);
        setup.seed = self.seed;
        self.trials.push(CommandTrial {
            settings: self.settings.clone(),
            setup,
        });
        self.first_avatar = true;
        Ok(())
    }

    fn apply(&mut self, key: &str, value: &str, line: usize) -> Result<(), ConfigError> {
        if self.first_avatar && AVATAR_KEYS.contains(&key) {
            return Err(ConfigError::NoCurrentAvatar {
                line,
                key: key.to_string(),
            });
        }
        match key {
            "newuser" => {
                if self.first_avatar {
                    self.first_avatar = false;
                } else {
                    self.push_avatar()?;
                }
            }
            "redirector" => {
                self.avatar.redirector = Self::choice("redirector", value, line, RedirectorKind::from_str)?;
            }
            "resetter" => {
                self.avatar.resetter = Self::choice("resetter", value, line, ResetterKind::from_str)?;
            }
            "pathseedchoice" => {
                self.avatar.path_seed = Self::choice("path seed", value, line, PathSeedKind::from_str)?;
            }
            "waypointsfilepath" => self.avatar.waypoints_file = Some(self.resolve(value)),
            "samplingintervalsfilepath" => self.avatar.sampling_intervals_file = Some(self.resolve(value)),
            "initialconfiguration" => self.avatar.initial_pose = Some(Self::pose(value, line)?),
            "physicaltarget" => self.avatar.physical_target = Some(Self::pose(value, line)?),
            "trackingspacechoice" => {
                self.space_kind = Self::choice("tracking space", value, line, TrackingSpaceKind::from_str)?;
            }
            "obstacletype" => {
                self.obstacle_type = value.parse().map_err(|_| ConfigError::InvalidNumber {
                    line,
                    value: value.to_string(),
                })?;
            }
            "squarewidth" => self.square_width = parse_number(value, line)?,
            "trackingspacefilepath" => self.space_file = Some(self.resolve(value)),
            "seed" => {
                self.seed = value.parse().map_err(|_| ConfigError::InvalidNumber {
                    line,
                    value: value.to_string(),
                })?;
            }
            "max_trans_gain" => self.settings.max_trans_gain = parse_number(value, line)?,
            "min_trans_gain" => self.settings.min_trans_gain = parse_number(value, line)?,
            "max_rot_gain" => self.settings.max_rot_gain = parse_number(value, line)?,
            "min_rot_gain" => self.settings.min_rot_gain = parse_number(value, line)?,
            "curvature_radius" => self.settings.curvature_radius = parse_number(value, line)?,
            "reset_trigger_buffer" => self.settings.reset_trigger_buffer = parse_number(value, line)?,
            "end" => self.end_trial()?,
            _ => {
                return Err(ConfigError::UnknownCommand {
                    line,
                    key: key.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Split `key = value`, `key value` or a bare `key`
fn split_command(line: &str) -> (String, &str) {
    let line = line.trim();
    let (key, rest) = match line.find(|c: char| c == '=' || c.is_whitespace()) {
        Some(at) => line.split_at(at),
        None => (line, ""),
    };
    let value = rest.trim_start().strip_prefix('=').unwrap_or(rest).trim();
    (key.to_lowercase(), value)
}

/// Parse a command file into trials; relative file paths resolve against `base_dir`
///
/// Parameter lines change `settings` for every later trial. Avatar lines
/// describe the avatar opened by the last `newUser`; each new avatar starts
/// as a copy of the previous one without its start pose. Avatars without a
/// start pose take the space's defaults.
pub fn parse_commands(text: &str, base_dir: &Path, settings: Settings) -> Result<Vec<CommandTrial>, ConfigError> {
    let mut parser = CommandParser::new(base_dir, settings);
    for (index, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let (key, value) = split_command(trimmed);
        parser.apply(&key, value, index + 1)?;
    }
    if !parser.first_avatar || !parser.pending.is_empty() {
        log::warn!("Command file ends without `end`; last trial dropped");
    }
    Ok(parser.trials)
}

pub fn load_commands(path: &Path, settings: Settings) -> Result<Vec<CommandTrial>, ConfigError> {
    let text = read_file(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let trials = parse_commands(&text, base_dir, settings)?;
    log::info!("Loaded {} trials from {}", trials.len(), path.display());
    Ok(trials)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waypoints_both_separators() {
        let waypoints = parse_waypoints("1,2\n3 4\n\n-1.5, 0.5\n", false).unwrap();
        assert_eq!(
            waypoints,
            vec![Vec2::new(1.0, 2.0), Vec2::new(3.0, 4.0), Vec2::new(-1.5, 0.5)]
        );
    }

    #[test]
    fn test_waypoints_relative_to_first() {
        let waypoints = parse_waypoints("1,1\n2,3\n", true).unwrap();
        assert_eq!(waypoints, vec![Vec2::ZERO, Vec2::new(1.0, 2.0)]);
    }

    #[test]
    fn test_waypoints_errors_carry_line() {
        assert!(matches!(
            parse_waypoints("0,0\n1,2,3\n", false),
            Err(ConfigError::MalformedLine { line: 2, expected: 2, found: 3 })
        ));
        assert!(matches!(
            parse_waypoints("0,0\n\nx,1\n", false),
            Err(ConfigError::InvalidNumber { line: 3, .. })
        ));
    }

    #[test]
    fn test_sampling_intervals() {
        assert_eq!(parse_sampling_intervals("0\n0.5\n 1.25 \n").unwrap(), vec![0.0, 0.5, 1.25]);
        assert!(parse_sampling_intervals("0.1\nnan\n").is_err());
    }

    #[test]
    fn test_tracking_space_file() {
        let text = "5,5\n-5,5\n-5,-5\n5,-5\n\n1,1\n-1,1\n-1,-1\n\n2,2\n3,3\n\n";
        let space = parse_tracking_space(text).unwrap();
        assert_eq!(space.boundary.len(), 4);
        // The two-point obstacle is dropped
        assert_eq!(space.obstacles.len(), 1);
        assert_eq!(space.obstacles[0].len(), 3);
        assert!(matches!(
            parse_tracking_space("0,0\n1,1\n"),
            Err(ConfigError::DegeneratePolygon { .. })
        ));
    }

    #[test]
    fn test_split_command() {
        assert_eq!(split_command("redirector = S2C"), ("redirector".to_string(), "S2C"));
        assert_eq!(split_command("squareWidth 6"), ("squarewidth".to_string(), "6"));
        assert_eq!(split_command("initialConfiguration=1,2,0,1"), ("initialconfiguration".to_string(), "1,2,0,1"));
        assert_eq!(split_command("end"), ("end".to_string(), ""));
    }

    #[test]
    fn test_commands_build_trials() {
        let text = "\
# two users in a square room
newUser
redirector = ThomasAPF
resetter = TwoOneTurn
pathSeedChoice = Sawtooth
initialConfiguration = 1,2,0,1
newUser
trackingSpaceChoice = Square
squareWidth = 10
curvature_radius = 10
seed = 42
end
newUser
redirector = S2C
end
";
        let trials = parse_commands(text, Path::new("."), Settings::default()).unwrap();
        assert_eq!(trials.len(), 2);

        let first = &trials[0];
        assert_eq!(first.setup.avatars.len(), 2);
        assert_eq!(first.setup.seed, 42);
        assert_eq!(first.settings.curvature_radius, 10.0);
        let a = &first.setup.avatars[0];
        assert_eq!(a.redirector, RedirectorKind::ThomasApf);
        assert_eq!(a.path, PathSource::Seed(PathSeedKind::Sawtooth));
        assert_eq!(a.initial_pose.position, Vec2::new(1.0, 2.0));
        // Copied from the first avatar, but placed by the space
        let b = &first.setup.avatars[1];
        assert_eq!(b.redirector, RedirectorKind::ThomasApf);
        assert_eq!(b.initial_pose.position, Vec2::new(-3.0, 3.0));

        let second = &trials[1];
        assert_eq!(second.setup.avatars.len(), 1);
        assert_eq!(second.setup.avatars[0].redirector, RedirectorKind::SteerToCenter);
        assert_eq!(second.setup.avatars[0].resetter, ResetterKind::TwoOneTurn);
    }

    #[test]
    fn test_command_defaults() {
        let trials = parse_commands("newUser\nend\n", Path::new("."), Settings::default()).unwrap();
        let avatar = &trials[0].setup.avatars[0];
        assert_eq!(avatar.redirector, RedirectorKind::Null);
        assert_eq!(avatar.resetter, ResetterKind::Null);
        assert_eq!(avatar.path, PathSource::Seed(PathSeedKind::StraightLine));
        assert_eq!(trials[0].setup.tracking_space.boundary.len(), 4);
    }

    #[test]
    fn test_command_errors() {
        assert!(matches!(
            parse_commands("newUser\nbogus = 1\n", Path::new("."), Settings::default()),
            Err(ConfigError::UnknownCommand { line: 2, .. })
        ));
        assert!(matches!(
            parse_commands("newUser\n\nredirector = warp\n", Path::new("."), Settings::default()),
            Err(ConfigError::UnknownChoice { line: 3, kind: "redirector", .. })
        ));
        assert!(matches!(
            parse_commands("newUser\ntrackingSpaceChoice = dome\n", Path::new("."), Settings::default()),
            Err(ConfigError::UnknownChoice { line: 2, kind: "tracking space", .. })
        ));
        assert!(matches!(
            parse_commands("newUser\npathSeedChoice = FilePath\nend\n", Path::new("."), Settings::default()),
            Err(ConfigError::MissingFile { .. })
        ));
    }

    #[test]
    fn test_avatar_keys_need_new_user() {
        let result = parse_commands("seed = 3\nredirector = S2C\n", Path::new("."), Settings::default());
        match result {
            Err(ConfigError::NoCurrentAvatar { line, key }) => {
                assert_eq!(line, 2);
                assert_eq!(key, "redirector");
            }
            other => panic!("unexpected result {:?}", other.map(|t| t.len())),
        }
        // After `end` the next trial needs its own newUser
        assert!(matches!(
            parse_commands("newUser\nend\nresetter = apf\n", Path::new("."), Settings::default()),
            Err(ConfigError::NoCurrentAvatar { line: 3, .. })
        ));
        // Trial-wide keys are fine anywhere
        let trials = parse_commands(
            "trackingSpaceChoice = Square\nnewUser\nend\n",
            Path::new("."),
            Settings::default(),
        )
        .unwrap();
        assert_eq!(trials.len(), 1);
    }

    #[test]
    fn test_relative_paths_resolve_against_command_dir() {
        let dir = std::env::temp_dir().join(format!("rdw-sim-io-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("walk.txt"), "0,1\n0,2\n").unwrap();
        std::fs::write(dir.join("walk_intervals.txt"), "0\n0.5\n").unwrap();
        std::fs::write(
            dir.join("trial.txt"),
            "newUser\npathSeedChoice = RealUserPath\nwaypointsFilePath = walk.txt\nsamplingIntervalsFilePath = walk_intervals.txt\nend\n",
        )
        .unwrap();

        let trials = load_commands(&dir.join("trial.txt"), Settings::default()).unwrap();
        match &trials[0].setup.avatars[0].path {
            PathSource::RealUserPath {
                waypoints,
                sampling_intervals,
            } => {
                assert_eq!(waypoints.len(), 2);
                assert_eq!(sampling_intervals, &vec![0.0, 0.5]);
            }
            other => panic!("unexpected path {:?}", other),
        }
        std::fs::remove_dir_all(&dir).ok();
    }
}
