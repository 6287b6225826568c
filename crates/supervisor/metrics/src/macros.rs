/// Records the outcome and latency of a call.
///
/// Increments `$success_metric` or `$error_metric` depending on whether `$block` evaluated to
/// `Ok`, and records the elapsed seconds in `$duration_metric`. Every series is labelled with
/// `method` plus any extra `key => value` labels. Evaluates to the result of `$block`.
#[macro_export]
macro_rules! observe_metrics_for_result {
    (
        $success_metric:expr,
        $error_metric:expr,
        $duration_metric:expr,
        $method_name:expr,
        $block:expr $(, $tag_key:expr => $tag_val:expr )*
    ) => {{
        let started = std::time::Instant::now();
        let result = $block;
        $crate::__record_call!(
            result.is_ok(),
            started,
            $success_metric,
            $error_metric,
            $duration_metric,
            $method_name
            $(, $tag_key => $tag_val )*
        );
        result
    }};
}

/// Same as [`observe_metrics_for_result!`], awaiting `$block` first.
#[macro_export]
macro_rules! observe_metrics_for_result_async {
    (
        $success_metric:expr,
        $error_metric:expr,
        $duration_metric:expr,
        $method_name:expr,
        $block:expr $(, $tag_key:expr => $tag_val:expr )*
    ) => {{
        let started = std::time::Instant::now();
        let result = $block.await;
        $crate::__record_call!(
            result.is_ok(),
            started,
            $success_metric,
            $error_metric,
            $duration_metric,
            $method_name
            $(, $tag_key => $tag_val )*
        );
        result
    }};
}

#[doc(hidden)]
#[macro_export]
macro_rules! __record_call {
    (
        $ok:expr,
        $started:expr,
        $success_metric:expr,
        $error_metric:expr,
        $duration_metric:expr,
        $method_name:expr $(, $tag_key:expr => $tag_val:expr )*
    ) => {{
        let outcome = if $ok { $success_metric } else { $error_metric };
        metrics::counter!(outcome, "method" => $method_name $(, $tag_key => $tag_val )*)
            .increment(1);
        metrics::histogram!($duration_metric, "method" => $method_name $(, $tag_key => $tag_val )*)
            .record($started.elapsed().as_secs_f64());
    }};
}
