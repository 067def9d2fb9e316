//! Tree-walking interpreter (§4.6 "Evaluator").
//!
//! Pure with respect to the AST: expression evaluation returns a value,
//! action execution mutates the `EvaluationContext` explicitly passed in
//! (§9 "Context as explicit parameter") rather than through ambient/
//! thread-local state, which is what makes concurrent evaluation trivially
//! safe.

use crate::collaborators::HttpCollaborator;
use crate::context::{EvaluationContext, FOREACH_CAP, LOOP_DEPTH_CAP};
use crate::error::EvalError;
use crate::functions;
use ruleforge_core::{
    Action, ArithOp, AssignOp, CompareOp, Condition, Expr, ListOp, LogicalOp, Namespace, RuleLogic,
    SimpleLogic, StructuredLogic, SubRule, Value,
};
use rust_decimal::Decimal;
use std::cmp::Ordering;

pub struct Evaluator<'a> {
    http: &'a dyn HttpCollaborator,
}

impl<'a> Evaluator<'a> {
    pub fn new(http: &'a dyn HttpCollaborator) -> Self {
        Self { http }
    }

    // ---- Expressions ----------------------------------------------------

    pub fn eval_expr(&self, expr: &Expr, ctx: &mut EvaluationContext) -> Result<Value, EvalError> {
        match expr {
            Expr::Literal(v, _) => Ok(v.clone()),
            Expr::Variable(name, _) => Ok(ctx.lookup(name)),
            Expr::Exists(name, _) => Ok(Value::Boolean(!ctx.lookup(name).is_null())),
            Expr::List(items, _) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.eval_expr(item, ctx)?);
                }
                Ok(Value::List(out))
            }
            Expr::Index(source, index, _) => {
                let list = self.eval_expr(source, ctx)?;
                let idx = self.eval_expr(index, ctx)?;
                index_into(&list, &idx)
            }
            Expr::Unary(op, operand, _) => self.eval_unary(*op, operand, ctx),
            Expr::Validation(op, operand, _) => {
                let v = self.eval_expr(operand, ctx)?;
                Ok(Value::Boolean(eval_validation(*op, &v)))
            }
            Expr::Logical(op, terms, _) => {
                let mut result = match op {
                    LogicalOp::And => true,
                    LogicalOp::Or => false,
                };
                for term in terms {
                    let v = self.eval_expr(term, ctx)?.is_truthy();
                    match op {
                        LogicalOp::And => {
                            result = result && v;
                            if !v {
                                break;
                            }
                        }
                        LogicalOp::Or => {
                            result = result || v;
                            if v {
                                break;
                            }
                        }
                    }
                }
                Ok(Value::Boolean(result))
            }
            Expr::Binary(op, lhs, rhs, _) => {
                let l = self.eval_expr(lhs, ctx)?;
                let r = self.eval_expr(rhs, ctx)?;
                eval_compare(*op, &l, &r)
            }
            Expr::BinaryArith(op, lhs, rhs, _) => {
                let l = self.eval_expr(lhs, ctx)?;
                let r = self.eval_expr(rhs, ctx)?;
                eval_arith(*op, &l, &r)
            }
            Expr::Arithmetic(terms, ops, _) => {
                let mut acc = self.eval_expr(&terms[0], ctx)?;
                for (op, term) in ops.iter().zip(terms.iter().skip(1)) {
                    let rhs = self.eval_expr(term, ctx)?;
                    acc = eval_arith(*op, &acc, &rhs)?;
                }
                Ok(acc)
            }
            Expr::FunctionCall(name, args, _) => {
                let mut values = Vec::with_capacity(args.len());
                for a in args {
                    values.push(self.eval_expr(a, ctx)?);
                }
                if let Some(audit_msg) = audit_call(name, &values) {
                    ctx.record_audit(audit_msg, values.get(1).cloned());
                }
                self.call_function(name, values)
            }
            Expr::JsonPath(source, path, _) => {
                let v = self.eval_expr(source, ctx)?;
                Ok(json_path_get(&v, path).unwrap_or(Value::Null))
            }
            Expr::RestCall {
                method,
                url,
                body,
                headers,
                timeout,
                ..
            } => self.eval_rest_call(method, url, body.as_deref(), headers.as_deref(), timeout.as_deref(), ctx),
        }
    }

    fn eval_unary(&self, op: ruleforge_core::UnaryOp, operand: &Expr, ctx: &mut EvaluationContext) -> Result<Value, EvalError> {
        use ruleforge_core::UnaryOp;
        match op {
            UnaryOp::Not => {
                let v = self.eval_expr(operand, ctx)?;
                Ok(Value::Boolean(!v.is_truthy()))
            }
            UnaryOp::Pos => {
                let v = self.eval_expr(operand, ctx)?;
                Ok(Value::Number(coerce_number(&v)?))
            }
            UnaryOp::Neg => {
                let v = self.eval_expr(operand, ctx)?;
                Ok(Value::Number(-coerce_number(&v)?))
            }
        }
    }

    fn eval_rest_call(
        &self,
        method: &str,
        url: &Expr,
        body: Option<&Expr>,
        headers: Option<&Expr>,
        timeout: Option<&Expr>,
        ctx: &mut EvaluationContext,
    ) -> Result<Value, EvalError> {
        let url_val = self.eval_expr(url, ctx)?;
        let url_str = url_val.as_str().map(str::to_string).unwrap_or_else(|| url_val.to_display_string());
        let body_val = body.map(|b| self.eval_expr(b, ctx)).transpose()?;
        let headers_val = headers.map(|h| self.eval_expr(h, ctx)).transpose()?;
        let timeout_ms = match timeout {
            Some(t) => coerce_number(&self.eval_expr(t, ctx)?)?.to_string().parse::<u64>().unwrap_or(5_000),
            None => 5_000,
        };

        match self.http.request(method, &url_str, headers_val.as_ref(), body_val.as_ref(), timeout_ms) {
            Ok(resp) => {
                let mut map = std::collections::BTreeMap::new();
                map.insert("status".to_string(), Value::Number(Decimal::from(resp.status)));
                map.insert("body".to_string(), resp.body);
                Ok(Value::Map(map))
            }
            Err(err) => {
                let mut map = std::collections::BTreeMap::new();
                map.insert("status".to_string(), Value::Number(Decimal::from(0)));
                map.insert("error".to_string(), Value::String(err));
                Ok(Value::Map(map))
            }
        }
    }

    /// Dispatches a function call by name. HTTP (`rest_*`) and JSON
    /// (`json_*`) functions need the collaborator/navigation context this
    /// struct carries, so they are handled here rather than in the
    /// otherwise side-effect-free `functions::call` registry.
    fn call_function(&self, name: &str, mut args: Vec<Value>) -> Result<Value, EvalError> {
        match name {
            "rest_get" | "rest_delete" => {
                if args.is_empty() {
                    return Err(EvalError::Arity { name: name.to_string(), min: 1, got: 0 });
                }
                let method = if name == "rest_get" { "GET" } else { "DELETE" };
                let url = args[0].as_str().map(str::to_string).unwrap_or_else(|| args[0].to_display_string());
                self.http_request(method, &url, None, None)
            }
            "rest_post" | "rest_put" | "rest_patch" => {
                if args.len() < 2 {
                    return Err(EvalError::Arity { name: name.to_string(), min: 2, got: args.len() });
                }
                let method = match name {
                    "rest_post" => "POST",
                    "rest_put" => "PUT",
                    _ => "PATCH",
                };
                let url = args[0].as_str().map(str::to_string).unwrap_or_else(|| args[0].to_display_string());
                let body = args.remove(1);
                self.http_request(method, &url, None, Some(&body))
            }
            "rest_call" => {
                if args.len() < 2 {
                    return Err(EvalError::Arity { name: name.to_string(), min: 2, got: args.len() });
                }
                let method = args[0].to_display_string().to_uppercase();
                let url = args[1].as_str().map(str::to_string).unwrap_or_else(|| args[1].to_display_string());
                let body = args.get(2).cloned();
                self.http_request(&method, &url, None, body.as_ref())
            }
            "json_get" | "json_path" => {
                if args.len() < 2 {
                    return Err(EvalError::Arity { name: name.to_string(), min: 2, got: args.len() });
                }
                let path = args[1].to_display_string();
                Ok(json_path_get(&args[0], &path).unwrap_or(Value::Null))
            }
            "json_exists" => {
                if args.len() < 2 {
                    return Err(EvalError::Arity { name: name.to_string(), min: 2, got: args.len() });
                }
                let path = args[1].to_display_string();
                Ok(Value::Boolean(json_path_get(&args[0], &path).is_some()))
            }
            "json_size" => {
                if args.len() < 2 {
                    return Err(EvalError::Arity { name: name.to_string(), min: 2, got: args.len() });
                }
                let path = args[1].to_display_string();
                Ok(Value::Number(Decimal::from(json_path_get(&args[0], &path).map(|v| value_length(&v)).unwrap_or(0) as i64)))
            }
            "json_type" => {
                if args.len() < 2 {
                    return Err(EvalError::Arity { name: name.to_string(), min: 2, got: args.len() });
                }
                let path = args[1].to_display_string();
                Ok(Value::String(json_path_get(&args[0], &path).unwrap_or(Value::Null).type_name().to_string()))
            }
            _ => functions::call(name, args),
        }
    }

    fn http_request(&self, method: &str, url: &str, headers: Option<&Value>, body: Option<&Value>) -> Result<Value, EvalError> {
        match self.http.request(method, url, headers, body, 5_000) {
            Ok(resp) => {
                let mut map = std::collections::BTreeMap::new();
                map.insert("status".to_string(), Value::Number(Decimal::from(resp.status)));
                map.insert("body".to_string(), resp.body);
                Ok(Value::Map(map))
            }
            Err(err) => {
                let mut map = std::collections::BTreeMap::new();
                map.insert("status".to_string(), Value::Number(Decimal::from(0)));
                map.insert("error".to_string(), Value::String(err));
                Ok(Value::Map(map))
            }
        }
    }

    // ---- Conditions ----------------------------------------------------

    pub fn eval_condition(&self, cond: &Condition, ctx: &mut EvaluationContext) -> Result<bool, EvalError> {
        match cond {
            Condition::ExpressionCondition(expr, _) => Ok(self.eval_expr(expr, ctx)?.is_truthy()),
            Condition::Not(inner, _) => Ok(!self.eval_condition(inner, ctx)?),
            Condition::Comparison(op, lhs, rhs, _) => {
                let l = self.eval_expr(lhs, ctx)?;
                let r = self.eval_expr(rhs, ctx)?;
                Ok(eval_compare(*op, &l, &r)?.is_truthy())
            }
            Condition::Logical(op, terms, _) => {
                let mut result = match op {
                    LogicalOp::And => true,
                    LogicalOp::Or => false,
                };
                for term in terms {
                    let v = self.eval_condition(term, ctx)?;
                    match op {
                        LogicalOp::And => {
                            result = result && v;
                            if !v {
                                break;
                            }
                        }
                        LogicalOp::Or => {
                            result = result || v;
                            if v {
                                break;
                            }
                        }
                    }
                }
                Ok(result)
            }
        }
    }

    // ---- Actions ----------------------------------------------------

    /// Executes a list of actions in order, stopping immediately once a
    /// circuit breaker has fired (§4.6 "CircuitBreaker ... halts all further
    /// action execution").
    pub fn exec_actions(&self, actions: &[Action], ctx: &mut EvaluationContext) -> Result<(), EvalError> {
        for action in actions {
            if ctx.circuit_triggered {
                break;
            }
            self.exec_action(action, ctx)?;
        }
        Ok(())
    }

    pub fn exec_action(&self, action: &Action, ctx: &mut EvaluationContext) -> Result<(), EvalError> {
        match action {
            Action::Set(var, expr, _) => {
                let v = self.eval_expr(expr, ctx)?;
                check_write_target(var)?;
                ctx.write_computed(var, v);
                Ok(())
            }
            Action::Assignment(op, var, expr, _) => {
                check_write_target(var)?;
                let rhs = self.eval_expr(expr, ctx)?;
                let new_val = match op {
                    AssignOp::Assign => rhs,
                    AssignOp::AddAssign => eval_arith(ArithOp::Add, &ctx.lookup(var), &rhs)?,
                    AssignOp::SubAssign => eval_arith(ArithOp::Sub, &ctx.lookup(var), &rhs)?,
                    AssignOp::MulAssign => eval_arith(ArithOp::Mul, &ctx.lookup(var), &rhs)?,
                    AssignOp::DivAssign => eval_arith(ArithOp::Div, &ctx.lookup(var), &rhs)?,
                    AssignOp::ModAssign => eval_arith(ArithOp::Mod, &ctx.lookup(var), &rhs)?,
                };
                ctx.write_computed(var, new_val);
                Ok(())
            }
            Action::Calculate(var, expr, _) => {
                check_write_target(var)?;
                let v = self.eval_expr(expr, ctx)?;
                let n = v.as_number().ok_or_else(|| EvalError::CalculateNotNumeric(var.clone()))?;
                ctx.write_computed(var, Value::Number(n));
                Ok(())
            }
            Action::Run(var, expr, _) => {
                check_write_target(var)?;
                let v = self.eval_expr(expr, ctx)?;
                ctx.write_computed(var, v);
                Ok(())
            }
            Action::Arithmetic(var, op, expr, _) => {
                check_write_target(var)?;
                let delta = self.eval_expr(expr, ctx)?;
                let current = ctx.lookup(var);
                let new_val = match (op, current.is_null()) {
                    (ArithOp::Add, true) => eval_arith(ArithOp::Add, &Value::Number(Decimal::ZERO), &delta)?,
                    (_, true) if !matches!(op, ArithOp::Add) => {
                        return Err(EvalError::NullArithmeticTarget(var.clone()));
                    }
                    _ => eval_arith(*op, &current, &delta)?,
                };
                ctx.write_computed(var, new_val);
                Ok(())
            }
            Action::List(op, var, expr, _) => {
                check_write_target(var)?;
                let value = self.eval_expr(expr, ctx)?;
                let current = ctx.lookup(var);
                let new_list = apply_list_op(*op, current, value);
                ctx.write_computed(var, new_list);
                Ok(())
            }
            Action::FunctionCall(name, args, result_var, _) => {
                let mut values = Vec::with_capacity(args.len());
                for a in args {
                    values.push(self.eval_expr(a, ctx)?);
                }
                if let Some(msg) = audit_call(name, &values) {
                    ctx.record_audit(msg, values.get(1).cloned());
                }
                let result = self.call_function(name, values)?;
                if let Some(var) = result_var {
                    check_write_target(var)?;
                    ctx.write_computed(var, result);
                }
                Ok(())
            }
            Action::Conditional(cond, then_actions, else_actions, _) => {
                if self.eval_condition(cond, ctx)? {
                    self.exec_actions(then_actions, ctx)
                } else {
                    self.exec_actions(else_actions, ctx)
                }
            }
            Action::ForEach {
                item_var,
                index_var,
                list,
                body,
                ..
            } => self.exec_foreach(item_var, index_var.as_deref(), list, body, ctx),
            Action::While(cond, body, _) => self.exec_while(cond, body, ctx),
            Action::DoWhile(body, cond, _) => self.exec_do_while(body, cond, ctx),
            Action::CircuitBreaker(expr, _) => {
                let v = self.eval_expr(expr, ctx)?;
                ctx.trigger_circuit(v.to_display_string());
                Ok(())
            }
        }
    }

    fn exec_foreach(
        &self,
        item_var: &str,
        index_var: Option<&str>,
        list_expr: &Expr,
        body: &[Action],
        ctx: &mut EvaluationContext,
    ) -> Result<(), EvalError> {
        let list_val = self.eval_expr(list_expr, ctx)?;
        let items = match list_val.as_list() {
            Some(items) => items.to_vec(),
            None => return Ok(()),
        };
        if items.len() > FOREACH_CAP {
            return Err(EvalError::LoopCapExceeded { cap: FOREACH_CAP });
        }
        for (i, item) in items.into_iter().enumerate() {
            if ctx.circuit_triggered {
                break;
            }
            let prior_item = ctx.shadow(item_var, item);
            let prior_index = index_var.map(|iv| (iv, ctx.shadow(iv, Value::Number(Decimal::from(i as i64)))));
            let result = self.exec_actions(body, ctx);
            ctx.restore_shadow(item_var, prior_item);
            if let Some((iv, prior)) = prior_index {
                ctx.restore_shadow(iv, prior);
            }
            result?;
        }
        Ok(())
    }

    fn exec_while(&self, cond: &Condition, body: &[Action], ctx: &mut EvaluationContext) -> Result<(), EvalError> {
        let mut iterations = 0usize;
        while self.eval_condition(cond, ctx)? {
            if ctx.circuit_triggered {
                break;
            }
            if iterations >= LOOP_DEPTH_CAP {
                return Err(EvalError::LoopCapExceeded { cap: LOOP_DEPTH_CAP });
            }
            self.exec_actions(body, ctx)?;
            iterations += 1;
        }
        Ok(())
    }

    fn exec_do_while(&self, body: &[Action], cond: &Condition, ctx: &mut EvaluationContext) -> Result<(), EvalError> {
        let mut iterations = 0usize;
        loop {
            if iterations >= LOOP_DEPTH_CAP {
                return Err(EvalError::LoopCapExceeded { cap: LOOP_DEPTH_CAP });
            }
            self.exec_actions(body, ctx)?;
            iterations += 1;
            if ctx.circuit_triggered || !self.eval_condition(cond, ctx)? {
                break;
            }
        }
        Ok(())
    }

    // ---- Rule-level orchestration (§4.6 "Rule-level orchestration") ------

    /// Runs a full `RuleLogic` tree against `ctx`, returning the top-level
    /// `condition_result` reported in `EvalResult`.
    pub fn exec_logic(&self, logic: &RuleLogic, ctx: &mut EvaluationContext) -> Result<bool, EvalError> {
        match logic {
            RuleLogic::Simple(simple) => self.exec_simple(simple, ctx),
            RuleLogic::Structured(structured) => self.exec_structured(structured, ctx),
            RuleLogic::Sequence(subrules) => self.exec_sequence(subrules, ctx),
        }
    }

    fn exec_simple(&self, logic: &SimpleLogic, ctx: &mut EvaluationContext) -> Result<bool, EvalError> {
        let mut all_true = true;
        for cond in &logic.when {
            if !self.eval_condition(cond, ctx)? {
                all_true = false;
                break;
            }
        }
        if all_true {
            self.exec_actions(&logic.then, ctx)?;
        } else {
            self.exec_actions(&logic.otherwise, ctx)?;
        }
        Ok(all_true)
    }

    fn exec_structured(&self, logic: &StructuredLogic, ctx: &mut EvaluationContext) -> Result<bool, EvalError> {
        let result = self.eval_condition(&logic.condition, ctx)?;
        if result {
            self.exec_actions(&logic.then, ctx)?;
        } else {
            self.exec_actions(&logic.otherwise, ctx)?;
        }
        Ok(result)
    }

    /// Sub-rules execute in declared order sharing one context; a sub-rule
    /// whose guard is present and false is skipped, not an error (§4.6). The
    /// sequence's `condition_result` is the logical AND of every sub-rule
    /// that actually ran (vacuously true if every guard was false).
    fn exec_sequence(&self, subrules: &[SubRule], ctx: &mut EvaluationContext) -> Result<bool, EvalError> {
        let mut overall = true;
        for sub in subrules {
            if ctx.circuit_triggered {
                break;
            }
            let should_run = match &sub.guard {
                Some(guard) => self.eval_condition(guard, ctx)?,
                None => true,
            };
            if !should_run {
                continue;
            }
            let result = self.exec_logic(&sub.logic, ctx)?;
            overall = overall && result;
        }
        Ok(overall)
    }
}

fn check_write_target(name: &str) -> Result<(), EvalError> {
    match ruleforge_core::namespace::classify(name) {
        Namespace::Computed => Ok(()),
        _ => Err(EvalError::InvalidWriteTarget(name.to_string())),
    }
}

fn coerce_number(v: &Value) -> Result<Decimal, EvalError> {
    match v {
        Value::Number(n) => Ok(*n),
        Value::Null => Ok(Decimal::ZERO),
        other => Err(EvalError::TypeMismatch {
            op: "arithmetic".to_string(),
            lhs: other.type_name(),
            rhs: "number",
        }),
    }
}

/// Binary arithmetic (§4.6): both operands coerced to number, except `+`
/// where either side being a string triggers textual concatenation instead.
fn eval_arith(op: ArithOp, l: &Value, r: &Value) -> Result<Value, EvalError> {
    if op == ArithOp::Add && (matches!(l, Value::String(_)) || matches!(r, Value::String(_))) {
        return Ok(Value::String(format!("{}{}", l.to_display_string(), r.to_display_string())));
    }

    let a = coerce_number(l)?;
    let b = coerce_number(r)?;
    match op {
        ArithOp::Add => Ok(Value::Number(a + b)),
        ArithOp::Sub => Ok(Value::Number(a - b)),
        ArithOp::Mul => Ok(Value::Number(a * b)),
        ArithOp::Div => {
            if b.is_zero() {
                return Err(EvalError::DivisionByZero);
            }
            Ok(Value::Number(a / b))
        }
        ArithOp::Mod => {
            if b.is_zero() {
                return Err(EvalError::DivisionByZero);
            }
            Ok(Value::Number(a % b))
        }
        ArithOp::Pow => Ok(Value::Number(decimal_pow(a, b))),
    }
}

fn decimal_pow(base: Decimal, exp: Decimal) -> Decimal {
    use rust_decimal::prelude::ToPrimitive;
    if exp.is_zero() {
        return Decimal::ONE;
    }
    if let Some(exp_i) = exp.to_i64() {
        if exp.fract().is_zero() {
            if exp_i >= 0 {
                let mut result = Decimal::ONE;
                for _ in 0..exp_i {
                    result *= base;
                }
                return result;
            }
            let mut result = Decimal::ONE;
            for _ in 0..(-exp_i) {
                result *= base;
            }
            if result.is_zero() {
                return Decimal::ZERO;
            }
            return Decimal::ONE / result;
        }
    }
    let base_f = base.to_f64().unwrap_or(0.0);
    let exp_f = exp.to_f64().unwrap_or(0.0);
    use std::str::FromStr;
    Decimal::from_str(&base_f.powf(exp_f).to_string()).unwrap_or(Decimal::ZERO)
}

/// Comparisons (§4.6): equality is structural and never errors; ordering
/// across incompatible types is `EvalError::IncomparableTypes`.
fn eval_compare(op: CompareOp, l: &Value, r: &Value) -> Result<Value, EvalError> {
    match op {
        CompareOp::Eq => Ok(Value::Boolean(l == r)),
        CompareOp::NotEq => Ok(Value::Boolean(l != r)),
        CompareOp::Lt => Ok(Value::Boolean(ordered(l, r)? == Ordering::Less)),
        CompareOp::Gt => Ok(Value::Boolean(ordered(l, r)? == Ordering::Greater)),
        CompareOp::LtEq => Ok(Value::Boolean(ordered(l, r)? != Ordering::Greater)),
        CompareOp::GtEq => Ok(Value::Boolean(ordered(l, r)? != Ordering::Less)),
        CompareOp::Between | CompareOp::NotBetween => {
            let bounds = r.as_list().ok_or_else(|| EvalError::TypeMismatch {
                op: "between".to_string(),
                lhs: r.type_name(),
                rhs: "list",
            })?;
            if bounds.len() != 2 {
                return Err(EvalError::Other("between requires exactly two bounds".to_string()));
            }
            let (lo, hi) = normalize_bounds(&bounds[0], &bounds[1])?;
            let within = ordered(l, &lo)? != Ordering::Less && ordered(l, &hi)? != Ordering::Greater;
            Ok(Value::Boolean(if op == CompareOp::Between { within } else { !within }))
        }
        CompareOp::Contains => Ok(Value::Boolean(contains(l, r))),
        CompareOp::NotContains => Ok(Value::Boolean(!contains(l, r))),
        CompareOp::StartsWith => Ok(Value::Boolean(l.to_display_string().starts_with(&r.to_display_string()))),
        CompareOp::EndsWith => Ok(Value::Boolean(l.to_display_string().ends_with(&r.to_display_string()))),
        CompareOp::Matches | CompareOp::NotMatches => {
            let pattern = r.to_display_string();
            let matched = regex::Regex::new(&pattern).map(|re| re.is_match(&l.to_display_string())).unwrap_or(false);
            Ok(Value::Boolean(if op == CompareOp::Matches { matched } else { !matched }))
        }
        CompareOp::InList => Ok(Value::Boolean(r.as_list().map(|l2| l2.contains(l)).unwrap_or(false))),
        CompareOp::NotInList => Ok(Value::Boolean(!r.as_list().map(|l2| l2.contains(l)).unwrap_or(false))),
        CompareOp::LengthEquals | CompareOp::LengthGreaterThan | CompareOp::LengthLessThan => {
            let len = value_length(l) as i64;
            let target = coerce_number(r)?;
            use rust_decimal::prelude::ToPrimitive;
            let target = target.to_i64().unwrap_or(0);
            let result = match op {
                CompareOp::LengthEquals => len == target,
                CompareOp::LengthGreaterThan => len > target,
                CompareOp::LengthLessThan => len < target,
                _ => unreachable!(),
            };
            Ok(Value::Boolean(result))
        }
        CompareOp::AgeAtLeast | CompareOp::AgeLessThan => {
            let years = age_years(l)?;
            let bound = coerce_number(r)?;
            use rust_decimal::prelude::ToPrimitive;
            let bound = bound.to_i64().unwrap_or(0);
            let result = if op == CompareOp::AgeAtLeast { years >= bound } else { years < bound };
            Ok(Value::Boolean(result))
        }
    }
}

fn ordered(l: &Value, r: &Value) -> Result<Ordering, EvalError> {
    l.partial_cmp(r).ok_or_else(|| EvalError::IncomparableTypes {
        lhs: l.type_name(),
        rhs: r.type_name(),
    })
}

/// `between a and b` does not require `a <= b`; the engine normalizes.
fn normalize_bounds(a: &Value, b: &Value) -> Result<(Value, Value), EvalError> {
    match ordered(a, b)? {
        Ordering::Greater => Ok((b.clone(), a.clone())),
        _ => Ok((a.clone(), b.clone())),
    }
}

fn contains(l: &Value, r: &Value) -> bool {
    match l {
        Value::List(items) => items.contains(r),
        Value::String(s) => s.contains(&r.to_display_string()),
        _ => false,
    }
}

fn value_length(v: &Value) -> usize {
    match v {
        Value::String(s) => s.chars().count(),
        Value::List(items) => items.len(),
        Value::Map(m) => m.len(),
        _ => 0,
    }
}

fn age_years(v: &Value) -> Result<i64, EvalError> {
    use chrono::{Datelike, Utc};
    let dt = match v {
        Value::DateTime(dt) => *dt,
        other => {
            return Err(EvalError::TypeMismatch {
                op: "age comparison".to_string(),
                lhs: other.type_name(),
                rhs: "date",
            })
        }
    };
    let now = Utc::now();
    let mut years = now.year() - dt.year();
    if (now.month(), now.day()) < (dt.month(), dt.day()) {
        years -= 1;
    }
    Ok(years as i64)
}

/// Postfix validation operators (§6): never raise, always produce boolean.
fn eval_validation(op: ruleforge_core::ValidationOp, v: &Value) -> bool {
    use ruleforge_core::ValidationOp;
    match op {
        ValidationOp::IsNull => v.is_null(),
        ValidationOp::IsNotNull => !v.is_null(),
        ValidationOp::IsEmpty => value_length(v) == 0,
        ValidationOp::IsNotEmpty => value_length(v) != 0,
        ValidationOp::IsNumeric | ValidationOp::IsNumber => v.as_number().is_some(),
        ValidationOp::IsNotNumeric => v.as_number().is_none(),
        ValidationOp::IsString => matches!(v, Value::String(_)),
        ValidationOp::IsBoolean => matches!(v, Value::Boolean(_)),
        ValidationOp::IsList => matches!(v, Value::List(_)),
        ValidationOp::IsEmail => v.as_str().map(|s| s.contains('@') && s.contains('.')).unwrap_or(false),
        ValidationOp::IsPhone => v
            .as_str()
            .map(|s| s.chars().filter(|c| c.is_ascii_digit()).count() >= 10)
            .unwrap_or(false),
        ValidationOp::IsDate => matches!(v, Value::DateTime(_)),
        ValidationOp::IsPositive => v.as_number().map(|n| n.is_sign_positive() && !n.is_zero()).unwrap_or(false),
        ValidationOp::IsNegative => v.as_number().map(|n| n.is_sign_negative() && !n.is_zero()).unwrap_or(false),
        ValidationOp::IsZero => v.as_number().map(|n| n.is_zero()).unwrap_or(false),
        ValidationOp::IsNonZero => v.as_number().map(|n| !n.is_zero()).unwrap_or(false),
        ValidationOp::IsPercentage => v.as_number().map(|n| n >= Decimal::ZERO && n <= Decimal::from(100)).unwrap_or(false),
        ValidationOp::IsCurrency => v.as_number().is_some(),
        ValidationOp::IsCreditScore => {
            use rust_decimal::prelude::ToPrimitive;
            v.as_number().and_then(|n| n.to_i64()).map(|n| (300..=850).contains(&n)).unwrap_or(false)
        }
        ValidationOp::IsSsn => v
            .as_str()
            .map(|s| s.chars().filter(|c| c.is_ascii_digit()).count() == 9)
            .unwrap_or(false),
        ValidationOp::IsAccountNumber => v
            .as_str()
            .map(|s| (4..=17).contains(&s.len()) && s.chars().all(|c| c.is_ascii_digit()))
            .unwrap_or(false),
        ValidationOp::IsRoutingNumber => v.as_str().map(|s| s.len() == 9 && s.chars().all(|c| c.is_ascii_digit())).unwrap_or(false),
        ValidationOp::IsBusinessDay => match v {
            Value::DateTime(dt) => {
                use chrono::Datelike;
                !matches!(dt.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun)
            }
            _ => false,
        },
        ValidationOp::IsWeekend => match v {
            Value::DateTime(dt) => {
                use chrono::Datelike;
                matches!(dt.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun)
            }
            _ => false,
        },
    }
}

fn apply_list_op(op: ListOp, current: Value, value: Value) -> Value {
    let mut list = current.as_list().map(|l| l.to_vec()).unwrap_or_default();
    match op {
        ListOp::Append => {
            if current.as_list().is_none() && !current.is_null() {
                return Value::List(vec![current, value]);
            }
            list.push(value);
            Value::List(list)
        }
        ListOp::Prepend => {
            if current.as_list().is_none() && !current.is_null() {
                return Value::List(vec![value, current]);
            }
            list.insert(0, value);
            Value::List(list)
        }
        ListOp::Remove => {
            if let Some(pos) = list.iter().position(|v| *v == value) {
                list.remove(pos);
            }
            Value::List(list)
        }
    }
}

fn index_into(list: &Value, index: &Value) -> Result<Value, EvalError> {
    use rust_decimal::prelude::ToPrimitive;
    let items = match list.as_list() {
        Some(items) => items,
        None => return Ok(Value::Null),
    };
    let idx = index.as_number().and_then(|n| n.to_i64()).unwrap_or(0);
    let resolved = if idx < 0 { items.len() as i64 + idx } else { idx };
    if resolved < 0 || resolved as usize >= items.len() {
        return Ok(Value::Null);
    }
    Ok(items[resolved as usize].clone())
}

/// Dotted-path navigation with `[n]` array indices (`[-1]` = last); missing
/// path returns `None` so the caller coerces to null (§4.6 "JsonPath").
fn json_path_get(source: &Value, path: &str) -> Option<Value> {
    let mut current = source.clone();
    for segment in path.split('.') {
        if segment.is_empty() {
            continue;
        }
        let (field, index) = split_index(segment);
        if let Some(field) = field {
            current = match &current {
                Value::Map(m) => m.get(field)?.clone(),
                _ => return None,
            };
        }
        if let Some(i) = index {
            let items = current.as_list()?;
            let resolved = if i < 0 { items.len() as i64 + i } else { i };
            if resolved < 0 || resolved as usize >= items.len() {
                return None;
            }
            current = items[resolved as usize].clone();
        }
    }
    Some(current)
}

fn split_index(segment: &str) -> (Option<&str>, Option<i64>) {
    if let Some(open) = segment.find('[') {
        let field = &segment[..open];
        let field = if field.is_empty() { None } else { Some(field) };
        let close = segment.find(']').unwrap_or(segment.len());
        let index = segment[open + 1..close].parse::<i64>().ok();
        (field, index)
    } else {
        (Some(segment), None)
    }
}

fn audit_call(name: &str, args: &[Value]) -> Option<String> {
    match name {
        "audit" | "audit_log" | "log" => Some(args.first().map(Value::to_display_string).unwrap_or_default()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::UnreachableHttpCollaborator;
    use std::collections::BTreeMap;

    fn eval() -> Evaluator<'static> {
        static HTTP: UnreachableHttpCollaborator = UnreachableHttpCollaborator;
        Evaluator::new(&HTTP)
    }

    fn ctx() -> EvaluationContext {
        EvaluationContext::new(BTreeMap::new(), BTreeMap::new())
    }

    #[test]
    fn exponent_is_right_associative() {
        let e = eval();
        let mut c = ctx();
        // 2 ** (3 ** 2) == 512
        let expr = Expr::BinaryArith(
            ArithOp::Pow,
            Box::new(Expr::Literal(Value::Number(Decimal::from(2)), ruleforge_core::Span::dummy())),
            Box::new(Expr::BinaryArith(
                ArithOp::Pow,
                Box::new(Expr::Literal(Value::Number(Decimal::from(3)), ruleforge_core::Span::dummy())),
                Box::new(Expr::Literal(Value::Number(Decimal::from(2)), ruleforge_core::Span::dummy())),
                ruleforge_core::Span::dummy(),
            )),
            ruleforge_core::Span::dummy(),
        );
        assert_eq!(e.eval_expr(&expr, &mut c).unwrap(), Value::Number(Decimal::from(512)));
    }

    #[test]
    fn division_by_zero_errors() {
        let e = eval();
        assert_eq!(
            eval_arith(ArithOp::Div, &Value::Number(Decimal::from(1)), &Value::Number(Decimal::ZERO)).unwrap_err(),
            EvalError::DivisionByZero
        );
        let _ = e;
    }

    #[test]
    fn zero_to_the_zero_is_one() {
        assert_eq!(decimal_pow(Decimal::ZERO, Decimal::ZERO), Decimal::ONE);
    }

    #[test]
    fn between_normalizes_reversed_bounds() {
        let result = eval_compare(
            CompareOp::Between,
            &Value::Number(Decimal::from(7)),
            &Value::List(vec![Value::Number(Decimal::from(10)), Value::Number(Decimal::from(5))]),
        )
        .unwrap();
        assert_eq!(result, Value::Boolean(true));
    }

    #[test]
    fn equality_across_types_is_false_not_error() {
        let result = eval_compare(CompareOp::Eq, &Value::String("5".into()), &Value::Number(Decimal::from(5))).unwrap();
        assert_eq!(result, Value::Boolean(false));
    }

    #[test]
    fn ordering_across_types_is_an_error() {
        let err = eval_compare(CompareOp::Lt, &Value::String("a".into()), &Value::Number(Decimal::from(1))).unwrap_err();
        assert!(matches!(err, EvalError::IncomparableTypes { .. }));
    }

    #[test]
    fn write_target_must_be_computed_shaped() {
        assert!(check_write_target("creditScore").is_err());
        assert!(check_write_target("debt_ratio").is_ok());
    }

    #[test]
    fn foreach_binds_item_and_index_then_unbinds() {
        let e = eval();
        let mut c = ctx();
        c.write_computed("amounts", Value::List(vec![Value::Number(Decimal::from(1)), Value::Number(Decimal::from(2))]));
        c.write_computed("total", Value::Number(Decimal::ZERO));
        let body = vec![Action::Arithmetic(
            "total".to_string(),
            ArithOp::Add,
            Expr::Variable("a".to_string(), ruleforge_core::Span::dummy()),
            ruleforge_core::Span::dummy(),
        )];
        e.exec_foreach("a", None, &Expr::Variable("amounts".to_string(), ruleforge_core::Span::dummy()), &body, &mut c)
            .unwrap();
        assert_eq!(c.lookup("total"), Value::Number(Decimal::from(3)));
        assert_eq!(c.lookup("a"), Value::Null);
    }

    #[test]
    fn circuit_breaker_halts_subsequent_actions() {
        let e = eval();
        let mut c = ctx();
        let actions = vec![
            Action::Set("a".to_string(), Expr::Literal(Value::Number(Decimal::from(1)), ruleforge_core::Span::dummy()), ruleforge_core::Span::dummy()),
            Action::CircuitBreaker(Expr::Literal(Value::String("stop".into()), ruleforge_core::Span::dummy()), ruleforge_core::Span::dummy()),
            Action::Set("a".to_string(), Expr::Literal(Value::Number(Decimal::from(2)), ruleforge_core::Span::dummy()), ruleforge_core::Span::dummy()),
        ];
        e.exec_actions(&actions, &mut c).unwrap();
        assert_eq!(c.lookup("a"), Value::Number(Decimal::from(1)));
        assert!(c.circuit_triggered);
        assert_eq!(c.circuit_message.as_deref(), Some("stop"));
    }

    #[test]
    fn loop_cap_exactly_at_limit_succeeds_cap_plus_one_fails() {
        let e = eval();
        let mut c = ctx();
        c.write_computed("i", Value::Number(Decimal::ZERO));
        let cond = Condition::Comparison(
            CompareOp::Lt,
            Expr::Variable("i".to_string(), ruleforge_core::Span::dummy()),
            Expr::Literal(Value::Number(Decimal::from(LOOP_DEPTH_CAP as i64)), ruleforge_core::Span::dummy()),
            ruleforge_core::Span::dummy(),
        );
        let body = vec![Action::Arithmetic(
            "i".to_string(),
            ArithOp::Add,
            Expr::Literal(Value::Number(Decimal::from(1)), ruleforge_core::Span::dummy()),
            ruleforge_core::Span::dummy(),
        )];
        assert!(e.exec_while(&cond, &body, &mut c).is_ok());

        let mut c2 = ctx();
        c2.write_computed("i", Value::Number(Decimal::ZERO));
        let cond2 = Condition::Comparison(
            CompareOp::Lt,
            Expr::Variable("i".to_string(), ruleforge_core::Span::dummy()),
            Expr::Literal(Value::Number(Decimal::from((LOOP_DEPTH_CAP + 1) as i64)), ruleforge_core::Span::dummy()),
            ruleforge_core::Span::dummy(),
        );
        let err = e.exec_while(&cond2, &body, &mut c2).unwrap_err();
        assert!(matches!(err, EvalError::LoopCapExceeded { .. }));
    }

    #[test]
    fn json_path_navigates_dotted_fields_and_negative_index() {
        let mut inner = BTreeMap::new();
        inner.insert("items".to_string(), Value::List(vec![Value::Number(Decimal::from(1)), Value::Number(Decimal::from(2))]));
        let mut outer = BTreeMap::new();
        outer.insert("data".to_string(), Value::Map(inner));
        let source = Value::Map(outer);
        assert_eq!(json_path_get(&source, "data.items[-1]"), Some(Value::Number(Decimal::from(2))));
        assert_eq!(json_path_get(&source, "missing.path"), None);
    }

    #[test]
    fn rest_call_failure_materializes_as_map_not_error() {
        let e = eval();
        let mut c = ctx();
        let call = Expr::RestCall {
            method: "GET".to_string(),
            url: Box::new(Expr::Literal(Value::String("https://bad.invalid/x".into()), ruleforge_core::Span::dummy())),
            body: None,
            headers: None,
            timeout: None,
            span: ruleforge_core::Span::dummy(),
        };
        let result = e.eval_expr(&call, &mut c).unwrap();
        match result {
            Value::Map(m) => {
                assert!(m.contains_key("error"));
            }
            _ => panic!("expected a map"),
        }
    }
}
