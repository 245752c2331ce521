// Collaborators at the edge of the frame loop: where frames come from
// and what classifies them

pub mod camera;
pub mod pose;
