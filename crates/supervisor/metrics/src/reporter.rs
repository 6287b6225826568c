/// A component that publishes gauges on demand.
///
/// The service calls [`MetricsReporter::report_metrics`] on a fixed interval.
#[auto_impl::auto_impl(&, Arc)]
pub trait MetricsReporter {
    /// Samples the component state and records it.
    fn report_metrics(&self);
}
