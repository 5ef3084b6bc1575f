use clap::Parser;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::sync::Arc;

use fiv::cli::{Args, HELP_COMMANDS};
use fiv::{Collection, Config, Item, Listener, SlotStatus};

/// Reports asynchronous decodes of the current image.
struct Printer;

impl Listener for Printer {
    fn loaded_current(&self) {
        println!("  (current image loaded)");
    }
}

fn status(item: &Item) -> &'static str {
    match item.primary_status() {
        SlotStatus::Empty => "not loaded",
        SlotStatus::Loading => "loading",
        SlotStatus::Loaded => "loaded",
        SlotStatus::Failed => "cannot be displayed",
    }
}

fn print_current(collection: &Collection) {
    let position = collection.position();
    let item = collection.current();
    println!(
        "[{}/{}{}] {} {} {}",
        position.index,
        position.total,
        if position.complete { "" } else { "+" },
        item,
        item.orientation(),
        status(&item),
    );
}

fn print_info(collection: &Collection) {
    let item = collection.current();
    println!("  name:        {}", item.name());
    if let Some(path) = item.filename() {
        println!("  file:        {}", path.display());
    }
    if let Some(dimensions) = item.dimensions() {
        println!("  dimensions:  {dimensions}");
    }
    println!("  orientation: {}", item.orientation());
    println!("  marked:      {}", collection.is_marked());
    println!("  resident:    {:?}", collection.resident());

    let Some(props) = item.properties() else {
        return;
    };
    if let Some(timestamp) = props.timestamp {
        println!("  taken:       {}", timestamp.format("%Y-%m-%d %H:%M:%S"));
    }
    if let Some(iso) = props.iso_speed {
        println!("  iso:         {iso}");
    }
    if let Some(aperture) = props.aperture {
        println!("  aperture:    f/{aperture:.1}");
    }
    if let Some(focal_length) = props.focal_length {
        println!("  focal:       {focal_length:.0}mm");
    }
    if let Some(exposure) = props.exposure_time {
        if exposure > 0.0 && exposure < 1.0 {
            println!("  exposure:    1/{:.0}s", 1.0 / exposure);
        } else {
            println!("  exposure:    {exposure}s");
        }
    }
    if let Some(flash) = props.flash {
        println!("  flash:       {}", if flash { "fired" } else { "off" });
    }
    if let Some(rating) = props.rating {
        println!("  rating:      {rating}");
    }
    for point in &props.focus_points {
        println!(
            "  focus:       {}x{} at {},{}",
            point.width, point.height, point.x, point.y
        );
    }
}

fn run(collection: &Collection) -> io::Result<()> {
    print_current(collection);
    collection.load_current();

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    for line in stdin.lock().lines() {
        let line = line?;
        let moved = match line.trim() {
            "" | "n" => collection.next(),
            "p" => collection.previous(),
            "f" => collection.first(),
            "l" => collection.last(),
            "r" => {
                collection.rotate_left();
                true
            }
            "R" => {
                collection.rotate_right();
                true
            }
            "h" => {
                collection.flip_horizontal();
                true
            }
            "v" => {
                collection.flip_vertical();
                true
            }
            "m" => {
                match collection.toggle_mark() {
                    Ok(true) => println!("  marked"),
                    Ok(false) => println!("  unmarked"),
                    Err(e) => eprintln!("  {e}"),
                }
                false
            }
            "t" => {
                let item = collection.current();
                match item.load_thumbnail().then(|| item.get_thumbnail()).flatten() {
                    Some(thumbnail) => println!("  thumbnail: {thumbnail} {}", status(&thumbnail)),
                    None => println!("  no thumbnail"),
                }
                false
            }
            "i" => {
                print_info(collection);
                false
            }
            "?" => {
                print!("{HELP_COMMANDS}");
                false
            }
            "q" => break,
            other => {
                eprintln!("  unknown command {other:?}, ? for help");
                false
            }
        };

        if moved {
            print_current(collection);
        }
        stdout.flush()?;
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(args.log_filter()))
        .init();

    let collection = Collection::new(Config::from(&args));
    let printer = Arc::new(Printer);
    collection.add_listener(&printer);

    if !collection.start() {
        log::error!("No image files found.");
        return ExitCode::FAILURE;
    }

    let result = run(&collection);
    collection.shutdown();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
