mod map;
mod matrix;
mod solver;
mod vector;
