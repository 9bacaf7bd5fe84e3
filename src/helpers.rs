pub mod img_drawing;
