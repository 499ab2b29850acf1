use log::*;
use simple_surf::{compute_matching_points, SurfConfig};

fn main() {
    pretty_env_logger::init_timed();
    let args: Vec<_> = std::env::args().collect();
    if args.len() != 3 {
        eprintln!("usage: {} <first image> <second image>", args[0]);
        std::process::exit(1);
    }
    let first = image::open(&args[1]).unwrap();
    let second = image::open(&args[2]).unwrap();
    let config = SurfConfig::default();
    info!("Matching {} and {} with {:?}", args[1], args[2], config);
    let points = compute_matching_points(&first, &second, &config).unwrap();
    println!("pixel, line, x, y");
    for point in points {
        println!("{}, {}, {}, {}", point.pixel, point.line, point.x, point.y);
    }
}
