//! GCTP projection codes of HDF-EOS grids, rendered as WKT.

use itertools::Itertools;
use log::warn;

/// Sphere names and axes of the GCTP sphere codes, indexed by code.
const SPHEROIDS: [(&str, f64, f64); 22] = [
    ("Clarke 1866", 6378206.4, 6356583.8),
    ("Clarke 1880", 6378249.145, 6356514.86955),
    ("Bessel", 6377397.155, 6356078.96284),
    ("International 1967", 6378157.5, 6356772.2),
    ("International 1909", 6378388.0, 6356911.94613),
    ("WGS 72", 6378135.0, 6356750.519915),
    ("Everest", 6377276.3452, 6356075.4133),
    ("WGS 66", 6378145.0, 6356759.769356),
    ("GRS 1980", 6378137.0, 6356752.31414),
    ("Airy", 6377563.396, 6356256.91),
    ("Modified Everest", 6377304.063, 6356103.039),
    ("Modified Airy", 6377340.189, 6356034.448),
    ("WGS 84", 6378137.0, 6356752.314245),
    ("Southeast Asia", 6378155.0, 6356773.3205),
    ("Australian National", 6378160.0, 6356774.719),
    ("Krassovsky", 6378245.0, 6356863.0188),
    ("Hough", 6378270.0, 6356794.343479),
    ("Mercury 1960", 6378166.0, 6356784.283666),
    ("Modified Mercury 1968", 6378150.0, 6356768.337303),
    ("Sphere of Radius 6370997m", 6370997.0, 6370997.0),
    ("Sphere of Radius 6371228m", 6371228.0, 6371228.0),
    ("Sphere of Radius 6371007.181m", 6371007.181, 6371007.181),
];

pub const WGS84_WKT: &str = r#"GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563]],PRIMEM["Greenwich",0],UNIT["degree",0.0174532925199433]]"#;

#[derive(Clone, Debug, PartialEq)]
pub enum Projection {
    Geographic,
    Utm,
    Albers,
    LambertConformalConic,
    Mercator,
    PolarStereographic,
    TransverseMercator,
    LambertAzimuthalEqualArea,
    Sinusoidal,
    IntegerizedSinusoidal,
    EquiRectangular,
    CylindricalEqualArea,
    Other(String),
}

impl Projection {
    pub fn from_name(name: &str) -> Self {
        match name {
            "GCTP_GEO" => Projection::Geographic,
            "GCTP_UTM" => Projection::Utm,
            "GCTP_ALBERS" => Projection::Albers,
            "GCTP_LAMCC" => Projection::LambertConformalConic,
            "GCTP_MERCAT" => Projection::Mercator,
            "GCTP_PS" => Projection::PolarStereographic,
            "GCTP_TM" => Projection::TransverseMercator,
            "GCTP_LAMAZ" => Projection::LambertAzimuthalEqualArea,
            "GCTP_SNSOID" => Projection::Sinusoidal,
            "GCTP_ISINUS" => Projection::IntegerizedSinusoidal,
            "GCTP_EQRECT" => Projection::EquiRectangular,
            "GCTP_CEA" | "GCTP_BCEA" => Projection::CylindricalEqualArea,
            other => Projection::Other(other.to_string()),
        }
    }

    pub fn is_geographic(&self) -> bool {
        matches!(self, Projection::Geographic)
    }
}

/// Decodes GCTP packed degrees `DDDMMMSSS.SS` to decimal degrees.
pub fn unpack_dms(packed: f64) -> f64 {
    let sign = if packed < 0. { -1. } else { 1. };
    let packed = packed.abs();
    let degrees = (packed / 1_000_000.).floor();
    let minutes = ((packed - degrees * 1_000_000.) / 1_000.).floor();
    let seconds = packed - degrees * 1_000_000. - minutes * 1_000.;
    sign * (degrees + minutes / 60. + seconds / 3600.)
}

/// Name, semi-major axis and inverse flattening of the grid's ellipsoid.
fn spheroid(sphere_code: Option<i64>, params: &[f64]) -> (String, f64, f64) {
    let inverse_flattening = |major: f64, minor: f64| {
        if (major - minor).abs() < f64::EPSILON {
            0.
        } else {
            major / (major - minor)
        }
    };
    match sphere_code {
        Some(code) if code < 0 => {
            let major = params.first().copied().filter(|major| *major > 0.);
            let Some(major) = major else {
                let (name, major, minor) = SPHEROIDS[0];
                return (name.to_string(), major, inverse_flattening(major, minor));
            };
            let minor = match params.get(1).copied() {
                // Values below one are the squared eccentricity.
                Some(e2) if e2 > 0. && e2 < 1. => major * (1. - e2).sqrt(),
                Some(minor) if minor > 0. => minor,
                _ => major,
            };
            (
                "Custom".to_string(),
                major,
                inverse_flattening(major, minor),
            )
        }
        code => {
            let code = code.unwrap_or(0);
            let (name, major, minor) = usize::try_from(code)
                .ok()
                .and_then(|code| SPHEROIDS.get(code))
                .copied()
                .unwrap_or_else(|| {
                    warn!("unknown sphere code {code}, using Clarke 1866");
                    SPHEROIDS[0]
                });
            (name.to_string(), major, inverse_flattening(major, minor))
        }
    }
}

fn geogcs(sphere_code: Option<i64>, params: &[f64]) -> String {
    let (name, major, inverse_flattening) = spheroid(sphere_code, params);
    format!(
        r#"GEOGCS["{name}",DATUM["{name}",SPHEROID["{name}",{major},{inverse_flattening}]],PRIMEM["Greenwich",0],UNIT["degree",0.0174532925199433]]"#
    )
}

fn projcs(name: &str, geogcs: &str, method: &str, parameters: &[(&str, f64)]) -> String {
    let parameters = parameters
        .iter()
        .map(|(key, value)| format!(r#"PARAMETER["{key}",{value}]"#))
        .join(",");
    format!(r#"PROJCS["{name}",{geogcs},PROJECTION["{method}"],{parameters},UNIT["metre",1]]"#)
}

/// WKT of a grid projection, `None` for projections without a rendering.
pub fn projection_wkt(
    projection: &Projection,
    params: &[f64],
    sphere_code: Option<i64>,
    zone_code: Option<i64>,
) -> Option<String> {
    let param = |idx: usize| params.get(idx).copied().unwrap_or(0.);
    let angle = |idx: usize| unpack_dms(param(idx));
    let geogcs = geogcs(sphere_code, params);
    let false_origin = [("false_easting", param(6)), ("false_northing", param(7))];
    let wkt = match projection {
        Projection::Geographic => geogcs,
        Projection::Utm => {
            let zone = zone_code
                .filter(|zone| *zone != 0)
                .unwrap_or_else(|| ((unpack_dms(param(0)) + 180.) / 6.).floor() as i64 + 1);
            let north = zone > 0;
            let zone = zone.abs();
            let hemisphere = if north { "Northern" } else { "Southern" };
            projcs(
                &format!("UTM Zone {zone}, {hemisphere} Hemisphere"),
                &geogcs,
                "Transverse_Mercator",
                &[
                    ("latitude_of_origin", 0.),
                    ("central_meridian", (zone * 6 - 183) as f64),
                    ("scale_factor", 0.9996),
                    ("false_easting", 500000.),
                    ("false_northing", if north { 0. } else { 10000000. }),
                ],
            )
        }
        Projection::TransverseMercator => projcs(
            "Transverse Mercator",
            &geogcs,
            "Transverse_Mercator",
            &[
                ("latitude_of_origin", angle(5)),
                ("central_meridian", angle(4)),
                ("scale_factor", param(2)),
                false_origin[0],
                false_origin[1],
            ],
        ),
        Projection::Albers | Projection::LambertConformalConic => {
            let (name, method) = if *projection == Projection::Albers {
                ("Albers Conical Equal Area", "Albers_Conic_Equal_Area")
            } else {
                ("Lambert Conformal Conic", "Lambert_Conformal_Conic_2SP")
            };
            projcs(
                name,
                &geogcs,
                method,
                &[
                    ("standard_parallel_1", angle(2)),
                    ("standard_parallel_2", angle(3)),
                    ("latitude_of_center", angle(5)),
                    ("longitude_of_center", angle(4)),
                    false_origin[0],
                    false_origin[1],
                ],
            )
        }
        Projection::Mercator => projcs(
            "Mercator",
            &geogcs,
            "Mercator_1SP",
            &[
                ("central_meridian", angle(4)),
                ("latitude_of_true_scale", angle(5)),
                false_origin[0],
                false_origin[1],
            ],
        ),
        Projection::PolarStereographic => projcs(
            "Polar Stereographic",
            &geogcs,
            "Polar_Stereographic",
            &[
                ("latitude_of_origin", angle(5)),
                ("central_meridian", angle(4)),
                false_origin[0],
                false_origin[1],
            ],
        ),
        Projection::LambertAzimuthalEqualArea => projcs(
            "Lambert Azimuthal Equal Area",
            &geogcs,
            "Lambert_Azimuthal_Equal_Area",
            &[
                ("latitude_of_center", angle(5)),
                ("longitude_of_center", angle(4)),
                false_origin[0],
                false_origin[1],
            ],
        ),
        Projection::Sinusoidal | Projection::IntegerizedSinusoidal => projcs(
            "Sinusoidal",
            &geogcs,
            "Sinusoidal",
            &[
                ("longitude_of_center", angle(4)),
                false_origin[0],
                false_origin[1],
            ],
        ),
        Projection::EquiRectangular => projcs(
            "Equirectangular",
            &geogcs,
            "Equirectangular",
            &[
                ("standard_parallel_1", angle(5)),
                ("central_meridian", angle(4)),
                false_origin[0],
                false_origin[1],
            ],
        ),
        Projection::CylindricalEqualArea => projcs(
            "Cylindrical Equal Area",
            &geogcs,
            "Cylindrical_Equal_Area",
            &[
                ("standard_parallel_1", angle(5)),
                ("central_meridian", angle(4)),
                false_origin[0],
                false_origin[1],
            ],
        ),
        Projection::Other(name) => {
            warn!("no projection description for {name}");
            return None;
        }
    };
    Some(wkt)
}
