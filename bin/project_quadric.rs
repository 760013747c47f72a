use apex_quadric::factors::{BoundingBoxFactor, BoundingBoxFactorConfig};
use apex_quadric::geometry::{
    AlignedBox2, Calibration, ConstrainedDualQuadric, Matrix4x9, QuadricCamera,
};
use apex_quadric::init_logger;
use apex_quadric::manifold::se3::SE3;
use clap::Parser;
use nalgebra::{Matrix4x6, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "project_quadric")]
#[command(about = "Project an ellipsoid into a pinhole camera and evaluate a bounding box factor")]
struct Args {
    /// Quadric centre "x,y,z" in world coordinates
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true, default_value = "0,0,0")]
    center: Vec<f64>,

    /// Quadric orientation "roll,pitch,yaw" in radians
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true, default_value = "0,0,0")]
    orientation: Vec<f64>,

    /// Quadric radii "r1,r2,r3"
    #[arg(long, value_delimiter = ',', default_value = "1,1,1")]
    radii: Vec<f64>,

    /// Camera position "x,y,z"
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true, default_value = "0,0,-5")]
    eye: Vec<f64>,

    /// Point the camera looks at "x,y,z"
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true, default_value = "0,0,0")]
    target: Vec<f64>,

    /// Calibration "fx,fy,skew,cx,cy"
    #[arg(long, value_delimiter = ',', default_value = "500,500,0,320,240")]
    intrinsics: Vec<f64>,

    /// Half-width of the uniform pixel noise added to the simulated detection
    #[arg(long, default_value = "2.0")]
    noise: f64,

    /// Seed for the detection noise
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Residual used when the projection is invalid
    #[arg(long, default_value = "1e6")]
    fallback_error: f64,
}

fn vector3(values: &[f64], name: &str) -> Result<Vector3<f64>, Box<dyn std::error::Error>> {
    match values {
        &[x, y, z] => Ok(Vector3::new(x, y, z)),
        _ => Err(format!("--{name} expects 3 comma separated values, got {}", values.len()).into()),
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let center = vector3(&args.center, "center")?;
    let orientation = vector3(&args.orientation, "orientation")?;
    let radii = vector3(&args.radii, "radii")?;
    let eye = vector3(&args.eye, "eye")?;
    let target = vector3(&args.target, "target")?;

    let calibration = Calibration::from_params(&args.intrinsics)?;

    let quadric = ConstrainedDualQuadric::new(
        SE3::from_translation_euler(
            center.x,
            center.y,
            center.z,
            orientation.x,
            orientation.y,
            orientation.z,
        ),
        radii,
    )?;
    let camera = SE3::look_at(eye, target, Vector3::new(0.0, -1.0, 0.0))
        .ok_or("camera eye and target must differ and not be aligned with the up axis")?;

    info!("Quadric: {}", quadric);
    info!("Camera:  {}", camera);
    info!("K = {:?}", calibration.params());

    if quadric.is_behind(&camera) {
        warn!("Quadric centroid is behind the camera");
    }
    if quadric.contains_pose(&camera) {
        warn!("Camera is inside the quadric");
    }

    let conic = QuadricCamera::project(&quadric, &camera, &calibration, None, None)?;
    info!("Dual conic: {}", conic);
    info!("Ellipse: {}", conic.is_ellipse());

    let bounds = conic.bounds(None)?;
    info!(
        "Bounds: [{:.3}, {:.3}] x [{:.3}, {:.3}] ({:.1} px²)",
        bounds.xmin(),
        bounds.xmax(),
        bounds.ymin(),
        bounds.ymax(),
        bounds.area()
    );

    let mut rng = StdRng::seed_from_u64(args.seed);
    let mut jitter = || {
        if args.noise > 0.0 {
            rng.random_range(-args.noise..args.noise)
        } else {
            0.0
        }
    };
    let detection = AlignedBox2::new(
        bounds.xmin() + jitter(),
        bounds.ymin() + jitter(),
        bounds.xmax() + jitter(),
        bounds.ymax() + jitter(),
    )?;
    info!("Simulated detection: {}", detection);

    let config = BoundingBoxFactorConfig::new().with_fallback_error(args.fallback_error);
    let factor = BoundingBoxFactor::with_config(detection, calibration, "x0", "q0", config);
    let mut h_pose = Matrix4x6::zeros();
    let mut h_quadric = Matrix4x9::zeros();
    let residual = factor.evaluate_error(&camera, &quadric, Some(&mut h_pose), Some(&mut h_quadric));
    info!(
        "Residual: [{:.4}, {:.4}, {:.4}, {:.4}]",
        residual[0], residual[1], residual[2], residual[3]
    );
    info!(
        "Jacobian norms: pose {:.4}, quadric {:.4}",
        h_pose.norm(),
        h_quadric.norm()
    );
    Ok(())
}

fn main() {
    init_logger();
    let args = Args::parse();
    if let Err(e) = run(&args) {
        error!("{}", e);
        std::process::exit(1);
    }
}
