mod condensation;
mod projector;
mod quadrature;
mod search;
mod sliding;
