use quaver_core as core;
use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::EnvFilter;

const ARGUMENTS: [&str; 5] = ["loop", "mode", "volume", "start", "backend"];

const HELP: &str = "\
Usage: quaver-cli <command> [options] <file>

Commands:
    info    Print the type, decoded size and duration of <file>
    play    Play <file> on the default output device
    help    Print this message

Options:
    --mode=memory|stream   Decode fully before playing, or stream (default)
    --loop=N               Play N times in total; negative loops forever
    --volume=V             Volume between 0 and 1
    --start=SECONDS        Seek before playing
    --backend=cpal|null    Output backend (null plays silently)

Set RUST_LOG=debug for diagnostics.";

type CommandArgs = HashMap<&'static str, String>;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum CommandKind {
    Info,
    Play,
    Help,
}

impl TryFrom<&str> for CommandKind {
    type Error = String;

    fn try_from(from: &str) -> Result<CommandKind, Self::Error> {
        match from {
            "info" => Ok(CommandKind::Info),
            "play" => Ok(CommandKind::Play),
            "help" | "--help" | "-h" => Ok(CommandKind::Help),
            other => Err(format!("Unknown sub-command \"{}\"", other)),
        }
    }
}

type Command = (CommandKind, CommandArgs);

fn parse_arg_param(arg_param: &str) -> Result<(&'static str, String), String> {
    let (arg_slice, param) = match arg_param.split_once('=') {
        Some((arg, param)) => (arg, String::from(param)),
        None => (arg_param, String::new()),
    };

    ARGUMENTS
        .into_iter()
        .find(|&s| s == arg_slice)
        .map(|arg| (arg, param))
        .ok_or_else(|| format!("Unrecognized argument {}", arg_slice))
}

fn parse_args<'a, T: Iterator<Item = &'a str>>(
    mut args: T,
) -> Result<Command, String> {
    let cmd = CommandKind::try_from(
        args.next()
            .ok_or_else(|| String::from("Missing sub-command"))?,
    )?;

    let mut map = HashMap::new();
    let mut reached_divider = false;

    for arg in args.by_ref() {
        if arg.starts_with('-') && !reached_divider {
            if arg == "--" {
                reached_divider = true;
            } else {
                let (argname, param) =
                    parse_arg_param(arg.trim_start_matches('-'))?;
                map.insert(argname, param);
            }
        } else {
            map.insert("in", arg.into());
            break;
        }
    }

    if let Some(last) = args.next() {
        return Err(format!("Unrecognized argument \"{}\"", last));
    }

    Ok((cmd, map))
}

fn expect_arg<'a>(
    args: &'a CommandArgs,
    argname: &str,
) -> Result<&'a String, String> {
    args.get(argname).ok_or_else(|| {
        if argname == "in" {
            "No input file provided".into()
        } else {
            format!("Expected argument \"{}\"", argname)
        }
    })
}

fn parse_param<T: std::str::FromStr>(
    args: &CommandArgs,
    argname: &str,
) -> Result<Option<T>, String> {
    args.get(argname)
        .map(|param| {
            param.parse::<T>().map_err(|_| {
                format!("Invalid value \"{}\" for \"{}\"", param, argname)
            })
        })
        .transpose()
}

fn audio_config(args: &CommandArgs) -> Result<core::AudioConfig, String> {
    let backend = match args.get("backend").map(String::as_str) {
        None | Some("cpal") => core::Backend::Cpal,
        Some("null") => core::Backend::Null,
        Some(other) => return Err(format!("Unknown backend \"{}\"", other)),
    };

    Ok(core::AudioConfig {
        backend,
        ..Default::default()
    })
}

fn open_sound(
    system: &core::AudioSystem,
    args: &CommandArgs,
    inpath: &Path,
) -> Result<core::Sound, String> {
    let sound = match args.get("mode").map(String::as_str) {
        None | Some("stream") => system.open_streaming(inpath),
        Some("memory") => system.open_memory(inpath),
        Some(other) => return Err(format!("Unknown mode \"{}\"", other)),
    };

    sound.map_err(|e| e.to_string())
}

fn run_command((cmd, args): Command) -> Result<(), String> {
    if cmd == CommandKind::Help {
        println!("{}", HELP);
        return Ok(());
    }

    let inpath = Path::new(expect_arg(&args, "in")?);

    // Info never makes a sound
    let config = if cmd == CommandKind::Info {
        core::AudioConfig::headless()
    } else {
        audio_config(&args)?
    };

    let system =
        core::AudioSystem::init(&config).map_err(|e| e.to_string())?;
    let sound = open_sound(&system, &args, inpath)?;

    match cmd {
        CommandKind::Info => print_info(&system, &sound),
        CommandKind::Play => play(&sound, &args)?,
        CommandKind::Help => {}
    }

    sound.close().map_err(|e| e.to_string())
}

fn print_info(system: &core::AudioSystem, sound: &core::Sound) {
    let info = sound.info();
    let format = system.format();

    println!("Information");
    println!("\tType = {:?}", info.sound_type);
    println!("\tMode = {:?}", info.mode);
    println!("\tSample rate = {}", format.sample_rate.hz());
    println!("\tChannels = {}", format.channels.count());
    println!("\tBytes per sample = {}", format.bit_depth.bytes());
    println!(
        "\tSize = {} bytes ({:.3}s)",
        info.size,
        sound.total_time().as_secs_f64()
    );
}

fn play(sound: &core::Sound, args: &CommandArgs) -> Result<(), String> {
    if let Some(volume) = parse_param::<f64>(args, "volume")? {
        if !(0.0..=1.0).contains(&volume) {
            return Err(String::from("Volume must be between 0 and 1"));
        }
        sound.set_volume(volume);
    }

    if let Some(start) = parse_param::<f64>(args, "start")? {
        let start = Duration::try_from_secs_f64(start)
            .map_err(|_| format!("Invalid start time {}", start))?;
        sound.seek_to_time(start).map_err(|e| e.to_string())?;
    }

    let times = parse_param::<i64>(args, "loop")?.unwrap_or(1);
    debug!(times, "starting playback");

    println!("Playing. . .");

    if times == 1 {
        sound.play_sync();
    } else {
        sound.loop_async(times);
        sound.wait_loop();
    }

    println!("Done.");

    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args_owned: Vec<String> = env::args().skip(1).collect();
    let args = args_owned.iter().map(|arg| &arg[..]);

    let result = parse_args(args);

    if let Err(e) = result.and_then(run_command) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
