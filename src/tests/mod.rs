pub mod support;

mod comps_tests;
