pub mod chart_generator;
