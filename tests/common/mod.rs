pub(crate) mod behaviours;

pub(crate) mod logging;

pub(crate) mod node;

pub(crate) mod ordering;
