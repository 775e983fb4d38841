mod four_momentum;
mod angles;
mod decay;

pub use four_momentum::FourMomentum;
pub use angles::{delta_phi, normalize_phi, eta_to_theta, theta_to_eta, w_transverse_mass};
pub use decay::{two_body_momentum, two_body_decay};
